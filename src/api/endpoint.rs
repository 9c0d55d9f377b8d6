use reqwest::Url;

use crate::errors::ClientError;

/// Port the backend listens on during local development.
const LOCAL_DEV_PORT: u16 = 8000;

/// REST and WebSocket base URLs derived from the hosting page origin.
///
/// `localhost` always talks plain HTTP/WS to port 8000; any other host reuses
/// the origin's scheme and authority (`https` maps to `wss`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    http_base: String,
    ws_base: String,
}

impl Endpoint {
    pub fn from_origin(origin: &str) -> Result<Self, ClientError> {
        let url = Url::parse(origin).map_err(|e| ClientError::InvalidUrl {
            url: origin.to_string(),
            message: e.to_string(),
        })?;
        let host = url.host_str().ok_or_else(|| ClientError::InvalidUrl {
            url: origin.to_string(),
            message: "origin has no host".to_string(),
        })?;

        if host == "localhost" {
            return Ok(Self {
                http_base: format!("http://localhost:{LOCAL_DEV_PORT}"),
                ws_base: format!("ws://localhost:{LOCAL_DEV_PORT}"),
            });
        }

        let (http_scheme, ws_scheme) = match url.scheme() {
            "https" | "wss" => ("https", "wss"),
            "http" | "ws" => ("http", "ws"),
            other => {
                return Err(ClientError::InvalidUrl {
                    url: origin.to_string(),
                    message: format!("unsupported scheme '{other}'"),
                })
            }
        };
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self {
            http_base: format!("{http_scheme}://{authority}"),
            ws_base: format!("{ws_scheme}://{authority}"),
        })
    }

    /// Absolute URL for a REST path such as `api/chats/get_chat`.
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/{}", self.http_base, path.trim_start_matches('/'))
    }

    /// WebSocket URL for a chat, with admin credentials when given.
    pub fn ws_url(&self, chat_id: &str, admin_token: Option<&str>) -> Result<String, ClientError> {
        let raw = format!("{}/ws/{}/", self.ws_base, chat_id);
        let mut url = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl {
            url: raw.clone(),
            message: e.to_string(),
        })?;
        if let Some(token) = admin_token {
            url.query_pairs_mut()
                .append_pair("token", token)
                .append_pair("as_admin", "true");
        }
        Ok(url.to_string())
    }
}
