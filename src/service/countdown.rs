use std::time::Duration;

use tokio::time::Instant;

/// Session countdown against a fixed deadline.
///
/// The owner samples it about once a second; `remaining` is recomputed from
/// the deadline, so late samples never stretch the countdown.
/// Reaching zero latches `expired` until the next `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Countdown {
    deadline: Option<Instant>,
    remaining: u64,
    expired: bool,
}

impl Countdown {
    /// (Re)starts from `seconds` at `now`. Returns `true` if the countdown
    /// expired on the spot.
    pub fn start(&mut self, seconds: u64, now: Instant) -> bool {
        self.remaining = seconds;
        self.expired = seconds == 0;
        self.deadline = (!self.expired).then(|| now + Duration::from_secs(seconds));
        self.expired
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Refreshes `remaining` at `now`. Returns `true` only on the call that
    /// reaches zero.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        let left = deadline.saturating_duration_since(now);
        // Whole seconds, rounded up: 4.2s left still shows 5.
        self.remaining = left.as_secs() + u64::from(left.subsec_nanos() > 0);
        if self.remaining == 0 {
            self.deadline = None;
            self.expired = true;
            return true;
        }
        false
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }
}
