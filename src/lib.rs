//! Client for a server-driven chat: one WebSocket per chat id, a local message
//! list, a session countdown and the manual/auto mode flag, exposed to a UI
//! through snapshots and a broadcast event stream.

pub mod api;
pub mod config;
pub mod errors;
pub mod i18n;
pub mod models;
pub mod service;
pub mod ws;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, ReconnectPolicy};
pub use errors::ClientError;
pub use models::{ChatMessage, ConnectionState, SenderRole};
pub use service::chat_session::{ChatSession, SessionDeps, SessionEvent, SessionSnapshot};
pub use service::hooks::{LogNotifier, Navigator, Notifier, ToastLevel};
pub use service::runner::{SessionHandle, SessionRunner};
