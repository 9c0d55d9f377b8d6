use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::service::chat_session::{ChatSession, SessionDeps, SessionEvent, SessionSnapshot};
use crate::ws::SocketEvent;

const COMMAND_CAPACITY: usize = 64;
const TICK: Duration = Duration::from_secs(1);

enum Command {
    SendMessage(String),
    ToggleMode(bool),
    Choice(String),
    Refresh,
    Reload,
    Focus,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn send_message(&self, content: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::SendMessage(content.into())).await
    }

    pub async fn toggle_chat_mode(&self, want_auto: bool) -> Result<(), ClientError> {
        self.command(Command::ToggleMode(want_auto)).await
    }

    pub async fn handle_choice_click(&self, option: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::Choice(option.into())).await
    }

    pub async fn refresh_chat(&self) -> Result<(), ClientError> {
        self.command(Command::Refresh).await
    }

    pub async fn reload_page(&self) -> Result<(), ClientError> {
        self.command(Command::Reload).await
    }

    /// Tells the session that the hosting window regained focus.
    pub async fn focus(&self) -> Result<(), ClientError> {
        self.command(Command::Focus).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Snapshot(tx)).await?;
        rx.await.map_err(|_| ClientError::SessionStopped)
    }

    /// Closes the socket and stops the session task (unmount).
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).await.map_err(|_| ClientError::SessionStopped)
    }
}

/// Owns a [`ChatSession`] and drives it from a single task.
pub struct SessionRunner {
    session: ChatSession,
    socket_events: mpsc::UnboundedReceiver<SocketEvent>,
    commands: mpsc::Receiver<Command>,
}

impl SessionRunner {
    /// Starts the session on the current tokio runtime.
    pub fn spawn(
        config: ClientConfig,
        deps: SessionDeps,
    ) -> Result<(SessionHandle, JoinHandle<()>), ClientError> {
        let (session, socket_events) = ChatSession::new(config, deps)?;
        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let handle = SessionHandle { commands: commands_tx, events: session.event_sender() };
        let runner = SessionRunner { session, socket_events, commands };
        Ok((handle, tokio::spawn(runner.run())))
    }

    async fn run(mut self) {
        self.session.start().await;

        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.apply(command).await,
                },
                Some(event) = self.socket_events.recv() => {
                    self.session.handle_socket_event(event).await;
                }
                _ = ticker.tick() => self.session.tick(),
            }

            // Count whole seconds from the moment the server set the timer.
            if self.session.take_countdown_restart() {
                ticker.reset();
            }
        }

        info!(chat_id = ?self.session.chat_id(), "Chat session stopped");
        self.session.close();
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::SendMessage(content) => self.session.send_message(&content),
            Command::ToggleMode(auto) => self.session.toggle_chat_mode(auto),
            Command::Choice(option) => self.session.handle_choice_click(&option),
            Command::Refresh => self.session.refresh_chat().await,
            Command::Reload => self.session.reload_page(),
            Command::Focus => self.session.on_focus().await,
            Command::Snapshot(reply) => {
                if reply.send(self.session.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
            Command::Shutdown => {}
        }
    }
}
