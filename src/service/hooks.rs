use tracing::{error, info, warn};

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Shows transient notifications to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: ToastLevel, message: &str);
}

/// Controls the hosting page.
pub trait Navigator: Send + Sync {
    /// Full reload of the hosting page.
    fn reload(&self);
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Info | ToastLevel::Success => info!(toast = message),
            ToastLevel::Warning => warn!(toast = message),
            ToastLevel::Error => error!(toast = message),
        }
    }
}
