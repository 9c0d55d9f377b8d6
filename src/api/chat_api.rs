use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::api::endpoint::Endpoint;
use crate::errors::ClientError;

const GET_CHAT_PATH: &str = "api/chats/get_chat";

/// Allocation of chat ids.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Returns the current chat id, or a brand new one when `force_new` is set.
    async fn get_chat(&self, force_new: bool) -> Result<String, ClientError>;
}

/// `ChatApi` backed by the REST endpoint `POST api/chats/get_chat`.
#[derive(Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpChatApi {
    pub fn new(client: reqwest::Client, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn get_chat(&self, force_new: bool) -> Result<String, ClientError> {
        let url = self.endpoint.rest_url(GET_CHAT_PATH);
        let mut request = self.client.post(&url);
        if force_new {
            request = request.query(&[("mode", "new")]);
        }

        let resp = request.send().await.map_err(|e| {
            error!("get_chat request failed: {e}");
            ClientError::http(GET_CHAT_PATH, e)
        })?;

        if !resp.status().is_success() {
            return Err(ClientError::HttpStatus {
                endpoint: GET_CHAT_PATH.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body: Value = resp.json().await.map_err(|e| ClientError::http(GET_CHAT_PATH, e))?;
        let chat_id = chat_id_from_body(&body).ok_or_else(|| ClientError::UnexpectedResponse {
            endpoint: GET_CHAT_PATH.to_string(),
            message: format!("no chat id in {body}"),
        })?;
        debug!(%chat_id, force_new, "Chat id received");
        Ok(chat_id)
    }
}

/// Accepts `{"chat_id": ..}` or `{"id": ..}` holding a string or a number.
fn chat_id_from_body(body: &Value) -> Option<String> {
    let raw = body.get("chat_id").or_else(|| body.get("id"))?;
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
