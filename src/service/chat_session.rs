use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api::chat_api::{ChatApi, HttpChatApi};
use crate::api::endpoint::Endpoint;
use crate::api::link_preview::{HttpLinkPreviewer, LinkPreviewer};
use crate::config::{ClientConfig, ReconnectPolicy};
use crate::errors::ClientError;
use crate::models::{ChatMessage, ConnectionState, InboundFrame, OutboundFrame, RawMessage};
use crate::service::countdown::Countdown;
use crate::service::hooks::{Navigator, Notifier, ToastLevel};
use crate::service::transform::{extract_content, MessageTransformer};
use crate::ws::connection::TungsteniteConnector;
use crate::ws::{Connector, Socket, SocketEvent, SocketEventKind};

const EVENT_CAPACITY: usize = 256;
/// Longest wait for a socket to open before the attempt counts as failed.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const AUTO_COMMAND: &str = "/auto";
const MANUAL_COMMAND: &str = "/manual";

/// Collaborators of a session, injected at construction.
#[derive(Clone)]
pub struct SessionDeps {
    pub connector: Arc<dyn Connector>,
    pub chat_api: Arc<dyn ChatApi>,
    pub previewer: Arc<dyn LinkPreviewer>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

impl SessionDeps {
    /// Production wiring: reqwest for REST, tokio-tungstenite for the socket.
    pub fn http(
        config: &ClientConfig,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let endpoint = config.endpoint()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ClientError::http("client", e))?;
        Ok(Self {
            connector: Arc::new(TungsteniteConnector),
            chat_api: Arc::new(HttpChatApi::new(client.clone(), endpoint.clone())),
            previewer: Arc::new(HttpLinkPreviewer::new(client, endpoint)),
            notifier,
            navigator,
        })
    }
}

/// Change notifications for a UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectionChanged(ConnectionState),
    MessagesReplaced(Vec<ChatMessage>),
    MessageReceived(ChatMessage),
    ChoicesChanged { options: Vec<String>, strict: bool },
    ModeChanged { auto: bool },
    TypingChanged(Option<String>),
    CountdownStarted(u64),
    TimerExpired,
}

/// Point-in-time copy of everything a chat view renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub chat_id: Option<String>,
    pub state: ConnectionState,
    pub messages: Vec<ChatMessage>,
    pub countdown_seconds: u64,
    pub timer_expired: bool,
    pub is_auto_mode: bool,
    pub choice_options: Vec<String>,
    pub is_choice_strict: bool,
    pub typing_indicator: Option<String>,
}

/// One chat conversation bound to one WebSocket.
///
/// All mutation goes through `&mut self`; the owner (normally
/// [`SessionRunner`](crate::service::runner::SessionRunner)) drives it from a
/// single task, feeding it socket events and one tick per second.
pub struct ChatSession {
    config: ClientConfig,
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    chat_api: Arc<dyn ChatApi>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    transformer: MessageTransformer,
    socket_events: mpsc::UnboundedSender<SocketEvent>,
    ui_events: broadcast::Sender<SessionEvent>,

    chat_id: Option<String>,
    socket: Option<Box<dyn Socket>>,
    generation: u64,
    state: ConnectionState,
    messages: Vec<ChatMessage>,
    countdown: Countdown,
    countdown_restarted: bool,
    is_auto_mode: bool,
    choice_options: Vec<String>,
    is_choice_strict: bool,
    typing_indicator: Option<String>,
    last_focus_attempt: Option<Instant>,
}

impl ChatSession {
    /// Builds an idle session. The receiver yields the events of every socket
    /// this session opens and must be fed back through `handle_socket_event`.
    pub fn new(
        config: ClientConfig,
        deps: SessionDeps,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SocketEvent>), ClientError> {
        let endpoint = config.endpoint()?;
        let (socket_events, socket_rx) = mpsc::unbounded_channel();
        let (ui_events, _) = broadcast::channel(EVENT_CAPACITY);
        let transformer = MessageTransformer::new(&config, deps.previewer);

        let session = Self {
            config,
            endpoint,
            connector: deps.connector,
            chat_api: deps.chat_api,
            notifier: deps.notifier,
            navigator: deps.navigator,
            transformer,
            socket_events,
            ui_events,
            chat_id: None,
            socket: None,
            generation: 0,
            state: ConnectionState::Disconnected,
            messages: Vec::new(),
            countdown: Countdown::default(),
            countdown_restarted: false,
            is_auto_mode: true,
            choice_options: Vec::new(),
            is_choice_strict: false,
            typing_indicator: None,
            last_focus_attempt: None,
        };
        Ok((session, socket_rx))
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.ui_events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.ui_events.clone()
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn is_auto_mode(&self) -> bool {
        self.is_auto_mode
    }

    pub fn choice_options(&self) -> &[String] {
        &self.choice_options
    }

    pub fn is_choice_strict(&self) -> bool {
        self.is_choice_strict
    }

    pub fn typing_indicator(&self) -> Option<&str> {
        self.typing_indicator.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            chat_id: self.chat_id.clone(),
            state: self.state,
            messages: self.messages.clone(),
            countdown_seconds: self.countdown.remaining(),
            timer_expired: self.countdown.is_expired(),
            is_auto_mode: self.is_auto_mode,
            choice_options: self.choice_options.clone(),
            is_choice_strict: self.is_choice_strict,
            typing_indicator: self.typing_indicator.clone(),
        }
    }

    /// True once after each countdown restart; lets the driver realign its ticker.
    pub fn take_countdown_restart(&mut self) -> bool {
        std::mem::take(&mut self.countdown_restarted)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Joins the configured chat, or asks the server for the current one.
    pub async fn start(&mut self) {
        if let Some(chat_id) = self.config.chat_id.clone() {
            self.initialize(&chat_id).await;
            return;
        }
        match self.chat_api.get_chat(false).await {
            Ok(chat_id) => self.initialize(&chat_id).await,
            Err(e) if e.is_transport() => {
                warn!("Chat backend unreachable: {e}");
                self.notifier.notify(ToastLevel::Error, self.config.locale.start_failed());
            }
            Err(e) => {
                error!("Failed to obtain chat id: {e}");
                self.notifier.notify(ToastLevel::Error, self.config.locale.start_failed());
            }
        }
    }

    /// Opens the socket for `chat_id`, replacing any previous one, then asks
    /// for the session status and the message history.
    pub async fn initialize(&mut self, chat_id: &str) {
        self.teardown();
        self.generation += 1;
        self.chat_id = Some(chat_id.to_string());
        self.set_state(ConnectionState::Connecting);

        let admin_token = self.config.admin_token.as_deref();
        let url = match self.endpoint.ws_url(chat_id, admin_token) {
            Ok(url) => url,
            Err(e) => {
                error!("Cannot build socket URL for chat {chat_id}: {e}");
                self.set_state(ConnectionState::Closed);
                return;
            }
        };

        let connect = self.connector.connect(&url, self.generation, self.socket_events.clone());
        let connected = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ConnectTimeout { url: url.clone(), timeout: CONNECT_TIMEOUT }),
        };
        match connected {
            Ok(socket) => {
                info!(chat_id, generation = self.generation, "Chat socket open");
                self.socket = Some(socket);
                self.set_state(ConnectionState::Open);
                self.send_frame(&OutboundFrame::StatusCheck);
                self.send_frame(&OutboundFrame::GetMessages {
                    with_enter: self.config.is_admin().then_some(true),
                });
            }
            Err(e) => {
                error!("Failed to open chat socket for {chat_id}: {e}");
                self.set_state(ConnectionState::Closed);
            }
        }
    }

    /// Stops the countdown and closes the socket (unmount).
    pub fn close(&mut self) {
        self.teardown();
        // Late events from the old socket must not match.
        self.generation += 1;
        self.set_state(ConnectionState::Closed);
    }

    fn teardown(&mut self) {
        self.countdown.stop();
        if let Some(mut socket) = self.socket.take() {
            socket.close();
        }
        self.set_typing(None);
        if self.state != ConnectionState::Disconnected {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Starts a brand new chat. If no new id can be obtained the current chat
    /// is kept as is.
    pub async fn refresh_chat(&mut self) {
        match self.chat_api.get_chat(true).await {
            Ok(chat_id) => {
                info!(%chat_id, "Switching to a new chat");
                self.teardown();
                self.messages.clear();
                self.emit(SessionEvent::MessagesReplaced(Vec::new()));
                self.set_choices(Vec::new(), false);
                self.initialize(&chat_id).await;
                if self.state == ConnectionState::Open {
                    self.notifier.notify(ToastLevel::Success, self.config.locale.refresh_succeeded());
                } else {
                    self.notifier.notify(ToastLevel::Error, self.config.locale.refresh_failed());
                }
            }
            Err(e) => {
                error!("Failed to refresh chat: {e}");
                self.notifier.notify(ToastLevel::Error, self.config.locale.refresh_failed());
            }
        }
    }

    pub fn reload_page(&self) {
        info!("Reloading page");
        self.navigator.reload();
    }

    /// Window focus: applies the configured reconnect policy.
    pub async fn on_focus(&mut self) {
        let ReconnectPolicy::OnFocus { min_interval } = self.config.reconnect else {
            return;
        };
        let now = Instant::now();
        if let Some(last) = self.last_focus_attempt {
            if now.duration_since(last) < min_interval {
                debug!("Focus reconnect suppressed");
                return;
            }
        }
        self.last_focus_attempt = Some(now);

        if self.socket_is_open() {
            self.send_frame(&OutboundFrame::StatusCheck);
        } else if let Some(chat_id) = self.chat_id.clone() {
            info!(%chat_id, "Reconnecting on focus");
            self.initialize(&chat_id).await;
        }
    }

    /// Samples the countdown; the driver calls this about once a second.
    pub fn tick(&mut self) {
        if self.countdown.tick(Instant::now()) {
            info!(chat_id = ?self.chat_id, "Session timer expired");
            self.emit(SessionEvent::TimerExpired);
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────────────

    /// Sends a chat message. Empty content and a closed socket are no-ops.
    pub fn send_message(&self, content: &str) {
        if content.is_empty() {
            return;
        }
        self.send_frame(&OutboundFrame::NewMessage { message: content.to_string() });
    }

    /// Asks the server to switch between the assistant and a human consultant.
    /// Every call sends a command, even if the mode already matches.
    pub fn toggle_chat_mode(&self, want_auto: bool) {
        self.send_message(if want_auto { AUTO_COMMAND } else { MANUAL_COMMAND });
    }

    pub fn handle_choice_click(&self, option: &str) {
        self.send_message(option);
    }

    fn socket_is_open(&self) -> bool {
        self.socket.as_ref().is_some_and(|s| s.is_open())
    }

    fn send_frame(&self, frame: &OutboundFrame) {
        let Some(socket) = self.socket.as_ref().filter(|s| s.is_open()) else {
            debug!(?frame, "Socket not open, dropping frame");
            return;
        };
        if let Err(e) = write_frame(socket.as_ref(), frame) {
            if e.is_transport() {
                warn!("Failed to send frame: {e}");
            } else {
                error!("Failed to encode frame: {e}");
            }
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    pub async fn handle_socket_event(&mut self, event: SocketEvent) {
        if event.generation != self.generation {
            debug!(generation = event.generation, "Ignoring event from a replaced socket");
            return;
        }
        match event.kind {
            SocketEventKind::Frame(text) => self.handle_frame(&text).await,
            SocketEventKind::Error(message) => warn!("Chat socket error: {message}"),
            SocketEventKind::Closed => {
                info!(chat_id = ?self.chat_id, "Chat socket closed");
                if let Some(mut socket) = self.socket.take() {
                    socket.close();
                }
                self.set_state(ConnectionState::Closed);
            }
        }
    }

    /// Dispatches one JSON frame from the server.
    pub async fn handle_frame(&mut self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Dropping malformed frame: {e}");
                return;
            }
        };
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("").to_string();
        let frame: InboundFrame = match serde_json::from_value(value) {
            Ok(f) => f,
            Err(e) => {
                warn!(kind = %kind, "Dropping frame with unexpected shape: {e}");
                return;
            }
        };

        match frame {
            InboundFrame::StatusCheck { remaining_time, manual_mode } => {
                if let Some(seconds) = remaining_time {
                    self.start_countdown(seconds);
                }
                if let Some(manual) = manual_mode {
                    self.set_auto_mode(!manual);
                }
            }
            InboundFrame::GetMessages { messages, remaining_time } => {
                self.messages = self.transformer.transform_all(&messages).await;
                debug!(count = self.messages.len(), "Message history replaced");
                self.emit(SessionEvent::MessagesReplaced(self.messages.clone()));
                let (options, strict) = messages.last().map(choices_of).unwrap_or_default();
                self.set_choices(options, strict);
                if let Some(seconds) = remaining_time {
                    self.start_countdown(seconds);
                }
            }
            InboundFrame::NewMessage(raw) => {
                let message = self.transformer.transform(&raw).await;
                self.messages.push(message.clone());
                let (options, strict) = choices_of(&raw);
                self.set_choices(options, strict);
                self.emit(SessionEvent::MessageReceived(message));
            }
            InboundFrame::TypingUsers { users } => {
                let bot_id = self.config.typing_bot_id.as_str();
                let typing = users.iter().any(|u| is_user(u, bot_id));
                let indicator = typing.then(|| self.config.locale.typing_indicator().to_string());
                self.set_typing(indicator);
            }
            InboundFrame::Attention { message } => {
                self.toast(ToastLevel::Warning, &message);
            }
            InboundFrame::Error { message } => {
                self.toast(ToastLevel::Error, &message);
            }
            InboundFrame::Unknown => {
                debug!(kind = %kind, "Unhandled frame type");
            }
        }
    }

    // ── State helpers ────────────────────────────────────────────────────────

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.ui_events.send(event);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::ConnectionChanged(state));
        }
    }

    fn start_countdown(&mut self, seconds: u64) {
        self.countdown_restarted = true;
        let expired = self.countdown.start(seconds, Instant::now());
        self.emit(SessionEvent::CountdownStarted(seconds));
        if expired {
            self.emit(SessionEvent::TimerExpired);
        }
    }

    fn set_auto_mode(&mut self, auto: bool) {
        if self.is_auto_mode != auto {
            self.is_auto_mode = auto;
            self.emit(SessionEvent::ModeChanged { auto });
        }
    }

    fn set_choices(&mut self, options: Vec<String>, strict: bool) {
        if self.choice_options != options || self.is_choice_strict != strict {
            self.choice_options = options;
            self.is_choice_strict = strict;
            self.emit(SessionEvent::ChoicesChanged {
                options: self.choice_options.clone(),
                strict,
            });
        }
    }

    fn set_typing(&mut self, indicator: Option<String>) {
        if self.typing_indicator != indicator {
            self.typing_indicator = indicator;
            self.emit(SessionEvent::TypingChanged(self.typing_indicator.clone()));
        }
    }

    fn toast(&self, level: ToastLevel, message: &Value) {
        let text = extract_content(message);
        if text.is_empty() {
            debug!(?level, "Server notification without text");
            return;
        }
        self.notifier.notify(level, &text);
    }
}

fn write_frame(socket: &dyn Socket, frame: &OutboundFrame) -> Result<(), ClientError> {
    let json = frame.to_json()?;
    socket.send_text(json)
}

/// Quick replies carried by a message; missing options clear the strict flag too.
fn choices_of(raw: &RawMessage) -> (Vec<String>, bool) {
    match &raw.choice_options {
        Some(options) if !options.is_empty() => (options.clone(), raw.choice_strict.unwrap_or(false)),
        _ => (Vec::new(), false),
    }
}

/// Matches a `typing_users` entry (plain id or user object) against `id`.
fn is_user(entry: &Value, id: &str) -> bool {
    match entry {
        Value::String(s) => s == id,
        Value::Number(n) => n.to_string() == id,
        Value::Object(map) => ["id", "user_id", "username", "name"]
            .iter()
            .filter_map(|key| map.get(*key))
            .any(|v| is_user(v, id)),
        _ => false,
    }
}
