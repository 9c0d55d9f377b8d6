use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::endpoint::Endpoint;
use crate::errors::ClientError;
use crate::models::LinkPreview;

const LINK_PREVIEW_PATH: &str = "api/linkpreview";

/// Source of link metadata for URLs found in message text.
#[async_trait]
pub trait LinkPreviewer: Send + Sync {
    /// `Ok(None)` means the proxy answered but had nothing to show.
    async fn preview(&self, url: &str) -> Result<Option<LinkPreview>, ClientError>;
}

#[derive(Serialize)]
struct PreviewRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct PreviewResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<LinkPreview>,
}

/// Previewer backed by the server-side scraper proxy `POST /api/linkpreview`.
#[derive(Clone)]
pub struct HttpLinkPreviewer {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpLinkPreviewer {
    pub fn new(client: reqwest::Client, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl LinkPreviewer for HttpLinkPreviewer {
    async fn preview(&self, url: &str) -> Result<Option<LinkPreview>, ClientError> {
        let resp = self
            .client
            .post(self.endpoint.rest_url(LINK_PREVIEW_PATH))
            .json(&PreviewRequest { url })
            .send()
            .await
            .map_err(|e| ClientError::http(LINK_PREVIEW_PATH, e))?;

        if !resp.status().is_success() {
            warn!(url, status = resp.status().as_u16(), "Link preview rejected");
            return Err(ClientError::HttpStatus {
                endpoint: LINK_PREVIEW_PATH.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body: PreviewResponse =
            resp.json().await.map_err(|e| ClientError::http(LINK_PREVIEW_PATH, e))?;
        if !body.success {
            debug!(url, "No preview available");
            return Ok(None);
        }
        Ok(body.data.map(|mut preview| {
            if preview.url.is_empty() {
                preview.url = url.to_string();
            }
            preview
        }))
    }
}
