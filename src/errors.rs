use std::time::Duration;

use thiserror::Error;

/// Top-level client error.
/// Every variant carries enough context to be logged or shown in a toast.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("Invalid configuration value for {key}: '{value}'")]
    Config { key: String, value: String },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    // ── REST errors ──────────────────────────────────────────────────────────
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned {status} for {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("Unexpected response from {endpoint}: {message}")]
    UnexpectedResponse { endpoint: String, message: String },

    // ── WebSocket errors ─────────────────────────────────────────────────────
    #[error("WebSocket connection to {url} failed: {source}")]
    WebSocketConnect {
        url: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    #[error("WebSocket connection to {url} timed out after {}s", timeout.as_secs())]
    ConnectTimeout { url: String, timeout: Duration },

    #[error("WebSocket is not open")]
    SocketClosed,

    // ── Misc ─────────────────────────────────────────────────────────────────
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chat session has stopped")]
    SessionStopped,
}

impl ClientError {
    pub fn config(key: impl Into<String>, value: impl Into<String>) -> Self {
        ClientError::Config { key: key.into(), value: value.into() }
    }

    pub fn http(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        ClientError::Http { endpoint: endpoint.into(), source }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ClientError::Config { .. } | ClientError::InvalidUrl { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Http { .. }
                | ClientError::HttpStatus { .. }
                | ClientError::WebSocketConnect { .. }
                | ClientError::ConnectTimeout { .. }
                | ClientError::SocketClosed
        )
    }
}
