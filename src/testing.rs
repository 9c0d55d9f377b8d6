//! In-memory stand-ins for the network and the UI, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::api::chat_api::ChatApi;
use crate::api::link_preview::LinkPreviewer;
use crate::errors::ClientError;
use crate::models::LinkPreview;
use crate::service::chat_session::SessionDeps;
use crate::service::hooks::{Navigator, Notifier, ToastLevel};
use crate::ws::{Connector, Socket, SocketEvent};

// ── Link previews ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub enum FakePreviewer {
    #[default]
    Empty,
    Titled(String),
    Failing,
    /// Answers with a titled preview after a delay.
    Slow(Duration),
}

impl FakePreviewer {
    pub fn with_title(title: &str) -> Self {
        FakePreviewer::Titled(title.to_string())
    }

    pub fn failing() -> Self {
        FakePreviewer::Failing
    }

    pub fn slow(delay: Duration) -> Self {
        FakePreviewer::Slow(delay)
    }
}

#[async_trait]
impl LinkPreviewer for FakePreviewer {
    async fn preview(&self, url: &str) -> Result<Option<LinkPreview>, ClientError> {
        match self {
            FakePreviewer::Empty => Ok(None),
            FakePreviewer::Titled(title) => Ok(Some(LinkPreview {
                url: url.to_string(),
                title: Some(title.clone()),
                ..LinkPreview::default()
            })),
            FakePreviewer::Failing => Err(ClientError::HttpStatus {
                endpoint: "api/linkpreview".to_string(),
                status: 500,
            }),
            FakePreviewer::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Some(LinkPreview {
                    url: url.to_string(),
                    title: Some("late".to_string()),
                    ..LinkPreview::default()
                }))
            }
        }
    }
}

// ── Sockets ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockSocketShared {
    sent: Mutex<Vec<String>>,
    open: AtomicBool,
}

struct MockSocket {
    shared: Arc<MockSocketShared>,
}

impl Socket for MockSocket {
    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    fn send_text(&self, text: String) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::SocketClosed);
        }
        self.shared.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.open.store(false, Ordering::SeqCst);
    }
}

struct Connection {
    url: String,
    generation: u64,
    shared: Arc<MockSocketShared>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

/// Connector that hands out recording sockets.
#[derive(Clone, Default)]
pub struct MockConnector {
    connections: Arc<Mutex<Vec<Connection>>>,
    fail: Arc<AtomicBool>,
    hang: Arc<AtomicBool>,
}

impl MockConnector {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes `connect` never resolve, like a host that drops packets.
    pub fn set_hanging(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.connections.lock().unwrap().iter().map(|c| c.url.clone()).collect()
    }

    /// Frames sent on the `index`-th socket.
    pub fn sent(&self, index: usize) -> Vec<String> {
        self.connections.lock().unwrap()[index].shared.sent.lock().unwrap().clone()
    }

    /// Frames sent on the most recent socket.
    pub fn last_sent(&self) -> Vec<String> {
        let count = self.connection_count();
        self.sent(count - 1)
    }

    pub fn clear_sent(&self) {
        for conn in self.connections.lock().unwrap().iter() {
            conn.shared.sent.lock().unwrap().clear();
        }
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.connections.lock().unwrap()[index].shared.open.load(Ordering::SeqCst)
    }

    /// Marks the latest socket as dropped without telling the session.
    pub fn drop_latest(&self) {
        if let Some(conn) = self.connections.lock().unwrap().last() {
            conn.shared.open.store(false, Ordering::SeqCst);
        }
    }

    /// Delivers a server frame through the latest socket's event channel.
    pub fn push_frame(&self, json: &str) {
        let conns = self.connections.lock().unwrap();
        let conn = conns.last().expect("no connection yet");
        conn.events.send(SocketEvent::frame(conn.generation, json)).unwrap();
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        url: &str,
        generation: u64,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Box<dyn Socket>, ClientError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::SocketClosed);
        }
        let shared = Arc::new(MockSocketShared::default());
        shared.open.store(true, Ordering::SeqCst);
        self.connections.lock().unwrap().push(Connection {
            url: url.to_string(),
            generation,
            shared: shared.clone(),
            events,
        });
        Ok(Box::new(MockSocket { shared }))
    }
}

// ── REST ─────────────────────────────────────────────────────────────────────

/// Chat API answering from a queue; an empty queue means failure.
#[derive(Clone, Default)]
pub struct ScriptedChatApi {
    replies: Arc<Mutex<VecDeque<Result<String, u16>>>>,
    calls: Arc<Mutex<Vec<bool>>>,
}

impl ScriptedChatApi {
    pub fn push_ok(&self, chat_id: &str) {
        self.replies.lock().unwrap().push_back(Ok(chat_id.to_string()));
    }

    pub fn push_err(&self, status: u16) {
        self.replies.lock().unwrap().push_back(Err(status));
    }

    /// `force_new` flag of every call so far.
    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for ScriptedChatApi {
    async fn get_chat(&self, force_new: bool) -> Result<String, ClientError> {
        self.calls.lock().unwrap().push(force_new);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(id)) => Ok(id),
            Some(Err(status)) => Err(ClientError::HttpStatus {
                endpoint: "api/chats/get_chat".to_string(),
                status,
            }),
            None => Err(ClientError::HttpStatus {
                endpoint: "api/chats/get_chat".to_string(),
                status: 503,
            }),
        }
    }
}

// ── UI hooks ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    toasts: Arc<Mutex<Vec<(ToastLevel, String)>>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<(ToastLevel, String)> {
        self.toasts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        self.toasts.lock().unwrap().push((level, message.to_string()));
    }
}

#[derive(Clone, Default)]
pub struct RecordingNavigator {
    reloads: Arc<Mutex<usize>>,
}

impl RecordingNavigator {
    pub fn reloads(&self) -> usize {
        *self.reloads.lock().unwrap()
    }
}

impl Navigator for RecordingNavigator {
    fn reload(&self) {
        *self.reloads.lock().unwrap() += 1;
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────────

/// All fakes, plus the `SessionDeps` built from them.
#[derive(Clone, Default)]
pub struct Fakes {
    pub connector: MockConnector,
    pub chat_api: ScriptedChatApi,
    pub previewer: FakePreviewer,
    pub notifier: RecordingNotifier,
    pub navigator: RecordingNavigator,
}

impl Fakes {
    pub fn deps(&self) -> SessionDeps {
        SessionDeps {
            connector: Arc::new(self.connector.clone()),
            chat_api: Arc::new(self.chat_api.clone()),
            previewer: Arc::new(self.previewer.clone()),
            notifier: Arc::new(self.notifier.clone()),
            navigator: Arc::new(self.navigator.clone()),
        }
    }
}
