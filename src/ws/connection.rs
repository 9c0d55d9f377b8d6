use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::errors::ClientError;
use crate::ws::{Connector, Socket, SocketEvent};

/// `Connector` over tokio-tungstenite (`ws://` and `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(
        &self,
        url: &str,
        generation: u64,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Box<dyn Socket>, ClientError> {
        let (stream, _response) =
            tokio_tungstenite::connect_async(url).await.map_err(|e| ClientError::WebSocketConnect {
                url: url.to_string(),
                source: Box::new(e),
            })?;
        info!(url, generation, "WebSocket connected");

        let (mut ws_tx, mut ws_rx) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let open = Arc::new(AtomicBool::new(true));

        // Writer: drains the outbound queue; a dropped sender closes the socket.
        let writer_open = open.clone();
        let writer = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    warn!("WebSocket send failed: {e}");
                    writer_open.store(false, Ordering::SeqCst);
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        // Reader: forwards text frames until the peer goes away.
        let reader_open = open.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if events.send(SocketEvent::frame(generation, text.to_string())).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(generation, ?frame, "WebSocket close frame received");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = events.send(SocketEvent::error(generation, e.to_string()));
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            let _ = events.send(SocketEvent::closed(generation));
        });

        Ok(Box::new(TungsteniteSocket {
            outbound: Some(outbound_tx),
            open,
            reader,
            writer,
        }))
    }
}

struct TungsteniteSocket {
    outbound: Option<mpsc::UnboundedSender<String>>,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Socket for TungsteniteSocket {
    fn is_open(&self) -> bool {
        self.outbound.is_some() && self.open.load(Ordering::SeqCst) && !self.writer.is_finished()
    }

    fn send_text(&self, text: String) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::SocketClosed);
        }
        match &self.outbound {
            Some(tx) => tx.send(text).map_err(|_| ClientError::SocketClosed),
            None => Err(ClientError::SocketClosed),
        }
    }

    fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        // Dropping the sender lets the writer flush and send a close frame.
        self.outbound = None;
        self.reader.abort();
    }
}

impl Drop for TungsteniteSocket {
    fn drop(&mut self) {
        self.close();
    }
}
