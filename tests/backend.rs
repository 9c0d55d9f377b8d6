//! Drives the real reqwest / tokio-tungstenite stack against an in-process
//! axum backend that speaks the chat protocol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chat_session_client::api::chat_api::{ChatApi, HttpChatApi};
use chat_session_client::api::endpoint::Endpoint;
use chat_session_client::api::link_preview::{HttpLinkPreviewer, LinkPreviewer};
use chat_session_client::{
    ClientConfig, ClientError, ConnectionState, LogNotifier, Navigator, SessionDeps,
    SessionEvent, SessionRunner,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;

#[derive(Clone, Default)]
struct Backend {
    issued: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Backend {
    fn received(&self) -> Vec<(String, Value)> {
        self.received.lock().unwrap().clone()
    }
}

#[derive(serde::Deserialize)]
struct GetChatQuery {
    mode: Option<String>,
}

async fn get_chat(State(backend): State<Backend>, Query(q): Query<GetChatQuery>) -> Json<Value> {
    let n = if q.mode.as_deref() == Some("new") {
        backend.issued.fetch_add(1, Ordering::SeqCst) + 1
    } else {
        backend.issued.load(Ordering::SeqCst)
    };
    Json(json!({ "chat_id": format!("chat-{n}") }))
}

async fn link_preview(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": { "url": body["url"], "title": "Example Domain", "image": "https://example.com/og.png" }
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(chat_id): Path<String>,
    State(backend): State<Backend>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, chat_id, backend))
}

async fn handle_socket(mut socket: WebSocket, chat_id: String, backend: Backend) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        backend.received.lock().unwrap().push((chat_id.clone(), frame.clone()));

        let reply = match frame["type"].as_str() {
            Some("status_check") => {
                json!({"type": "status_check", "remaining_time": 300, "manual_mode": false})
            }
            Some("get_messages") => json!({
                "type": "get_messages",
                "remaining_time": 300,
                "messages": [
                    {"id": 1, "message": "Hi, I need help", "sender_role": "\"Client\"",
                     "timestamp": "2024-01-01T10:00:00.123"},
                    {"id": 2, "message": "Sure, see https://example.com", "sender_role": "\"AI\"",
                     "timestamp": "2024-01-01T10:00:05", "choice_options": ["Thanks", "More"]}
                ]
            }),
            Some("new_message") => json!({
                "type": "new_message",
                "id": 3,
                "message": format!("echo: {}", frame["message"].as_str().unwrap_or("")),
                "sender_role": "{\"en\":\"Consultant\",\"ru\":\"Консультант\"}",
                "timestamp": "2024-01-01T10:01:00"
            }),
            _ => continue,
        };
        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
            break;
        }
    }
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/chats/get_chat", post(get_chat))
        .route("/api/linkpreview", post(link_preview))
        .route("/ws/{chat_id}/", get(ws_handler))
        .with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), backend)
}

struct NoReload;

impl Navigator for NoReload {
    fn reload(&self) {}
}

async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    wanted: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = events.recv().await.unwrap();
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event did not arrive in time")
}

#[tokio::test]
async fn full_session_against_backend() {
    let (origin, backend) = spawn_backend().await;
    let config = ClientConfig { origin, ..ClientConfig::default() };
    let deps = SessionDeps::http(&config, Arc::new(LogNotifier), Arc::new(NoReload)).unwrap();
    let (handle, task) = SessionRunner::spawn(config, deps).unwrap();
    let mut events = handle.subscribe();

    // History arrives right after the socket opens.
    let SessionEvent::MessagesReplaced(history) =
        wait_for(&mut events, |e| matches!(e, SessionEvent::MessagesReplaced(m) if !m.is_empty())).await
    else {
        unreachable!()
    };
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "Hi, I need help");
    assert_eq!(history[0].sender_id, "1234");
    assert!(!history[0].sent);
    assert!(history[1].sent);
    let preview = history[1].files.as_ref().unwrap()[0].preview.clone().unwrap();
    assert_eq!(preview.title.as_deref(), Some("Example Domain"));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.chat_id.as_deref(), Some("chat-0"));
    assert_eq!(snapshot.state, ConnectionState::Open);
    assert!(snapshot.is_auto_mode);
    assert_eq!(snapshot.choice_options, vec!["Thanks".to_string(), "More".to_string()]);
    assert!(snapshot.countdown_seconds > 290);

    // A sent message comes back as a consultant reply.
    handle.send_message("ping").await.unwrap();
    let SessionEvent::MessageReceived(reply) =
        wait_for(&mut events, |e| matches!(e, SessionEvent::MessageReceived(_))).await
    else {
        unreachable!()
    };
    assert_eq!(reply.content, "echo: ping");
    assert_eq!(reply.username, "Consultant");
    assert!(reply.sent);

    // Refresh moves to a new chat id with a fresh socket.
    handle.refresh_chat().await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.chat_id.as_deref(), Some("chat-1"));
    wait_for(&mut events, |e| matches!(e, SessionEvent::MessagesReplaced(m) if !m.is_empty())).await;

    let received = backend.received();
    let kinds: Vec<(&str, &str)> = received
        .iter()
        .map(|(chat, frame)| (chat.as_str(), frame["type"].as_str().unwrap()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("chat-0", "status_check"),
            ("chat-0", "get_messages"),
            ("chat-0", "new_message"),
            ("chat-1", "status_check"),
            ("chat-1", "get_messages"),
        ]
    );
    assert_eq!(received[2].1["message"], "ping");

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_leaves_session_disconnected() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = ClientConfig { origin, chat_id: Some("x".into()), ..ClientConfig::default() };
    let deps = SessionDeps::http(&config, Arc::new(LogNotifier), Arc::new(NoReload)).unwrap();
    let (handle, _task) = SessionRunner::spawn(config, deps).unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Closed);
    // Sending on a dead session is silently dropped.
    handle.send_message("anyone?").await.unwrap();
}

// ── REST failures ────────────────────────────────────────────────────────────

async fn get_chat_unavailable() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn link_preview_picky(Json(body): Json<Value>) -> axum::response::Response {
    let url = body["url"].as_str().unwrap_or("");
    if url.contains("nothing") {
        Json(json!({ "success": false, "data": null })).into_response()
    } else {
        (StatusCode::BAD_GATEWAY, "scraper down").into_response()
    }
}

async fn spawn_failing_backend() -> Endpoint {
    let app = Router::new()
        .route("/api/chats/get_chat", post(get_chat_unavailable))
        .route("/api/linkpreview", post(link_preview_picky));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Endpoint::from_origin(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn get_chat_surfaces_server_errors() {
    let endpoint = spawn_failing_backend().await;
    let api = HttpChatApi::new(reqwest::Client::new(), endpoint);

    for force_new in [false, true] {
        let err = api.get_chat(force_new).await.unwrap_err();
        assert!(
            matches!(&err, ClientError::HttpStatus { status: 500, endpoint } if endpoint == "api/chats/get_chat"),
            "unexpected error: {err}"
        );
        assert!(err.is_transport());
    }
}

#[tokio::test]
async fn link_preview_distinguishes_empty_and_failed() {
    let endpoint = spawn_failing_backend().await;
    let previewer = HttpLinkPreviewer::new(reqwest::Client::new(), endpoint);

    let empty = previewer.preview("https://nothing.example").await.unwrap();
    assert!(empty.is_none());

    let err = previewer.preview("https://example.com").await.unwrap_err();
    assert!(matches!(err, ClientError::HttpStatus { status: 502, .. }), "unexpected error: {err}");
}

#[tokio::test]
async fn session_start_survives_get_chat_failure() {
    let endpoint_origin = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/api/chats/get_chat", post(get_chat_unavailable));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    };
    let config = ClientConfig { origin: endpoint_origin, ..ClientConfig::default() };
    let deps = SessionDeps::http(&config, Arc::new(LogNotifier), Arc::new(NoReload)).unwrap();
    let (handle, _task) = SessionRunner::spawn(config, deps).unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.chat_id, None);
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert!(snapshot.messages.is_empty());
}
