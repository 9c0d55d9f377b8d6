pub mod connection;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::ClientError;

/// What a socket reports back to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEventKind {
    /// A text frame, still JSON-encoded.
    Frame(String),
    Error(String),
    Closed,
}

/// Socket event tagged with the generation of the socket that produced it,
/// so that events from a replaced socket can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEvent {
    pub generation: u64,
    pub kind: SocketEventKind,
}

impl SocketEvent {
    pub fn frame(generation: u64, text: impl Into<String>) -> Self {
        Self { generation, kind: SocketEventKind::Frame(text.into()) }
    }

    pub fn error(generation: u64, message: impl Into<String>) -> Self {
        Self { generation, kind: SocketEventKind::Error(message.into()) }
    }

    pub fn closed(generation: u64) -> Self {
        Self { generation, kind: SocketEventKind::Closed }
    }
}

/// An open connection. Sending is fire-and-forget.
pub trait Socket: Send {
    fn is_open(&self) -> bool;

    fn send_text(&self, text: String) -> Result<(), ClientError>;

    /// Closes the connection and detaches it: no further events are delivered.
    fn close(&mut self);
}

/// Opens sockets. Returns once the connection is open.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        generation: u64,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Box<dyn Socket>, ClientError>;
}
