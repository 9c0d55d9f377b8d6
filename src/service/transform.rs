use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use futures_util::future::join_all;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::link_preview::LinkPreviewer;
use crate::config::ClientConfig;
use crate::i18n::{Locale, RoleTable};
use crate::models::{Attachment, ChatMessage, RawMessage, RoleLabel, SenderRole};

/// Participant id of the client side of the conversation (rendered on the left).
pub const CLIENT_PARTICIPANT_ID: &str = "1234";
/// Participant id of the assistant/consultant side (rendered on the right).
pub const OWN_PARTICIPANT_ID: &str = "4321";

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("URL pattern is valid"));

/// Longest wait for a link preview before the message is shown without one.
pub const PREVIEW_TIMEOUT: Duration = Duration::from_secs(3);

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Turns raw server messages into display messages.
#[derive(Clone)]
pub struct MessageTransformer {
    locale: Locale,
    utc_offset: FixedOffset,
    roles: RoleTable,
    previewer: Arc<dyn LinkPreviewer>,
}

impl MessageTransformer {
    pub fn new(config: &ClientConfig, previewer: Arc<dyn LinkPreviewer>) -> Self {
        Self {
            locale: config.locale,
            utc_offset: config.utc_offset,
            roles: config.roles.clone(),
            previewer,
        }
    }

    /// Transforms every message; output order and length match the input.
    pub async fn transform_all(&self, raw: &[RawMessage]) -> Vec<ChatMessage> {
        join_all(raw.iter().map(|m| self.transform(m))).await
    }

    pub async fn transform(&self, raw: &RawMessage) -> ChatMessage {
        let content = extract_content(&raw.message);
        let role = self.resolve_role(&raw.sender_role);
        let sender_id = if role.is_own_side() { OWN_PARTICIPANT_ID } else { CLIENT_PARTICIPANT_ID };

        let when = raw
            .timestamp
            .as_ref()
            .and_then(parse_timestamp_value)
            .unwrap_or_else(|| {
                debug!(timestamp = ?raw.timestamp, "Unparseable timestamp, using now");
                Utc::now()
            });
        let local = when.with_timezone(&self.utc_offset);

        let mut files = raw.files.clone().filter(|f| !f.is_empty());
        if let Some(url) = find_url(&content) {
            match tokio::time::timeout(PREVIEW_TIMEOUT, self.previewer.preview(url)).await {
                Ok(Ok(Some(preview))) => {
                    files.get_or_insert_with(Vec::new).push(Attachment::from_preview(preview))
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => warn!(url, "Link preview failed: {e}"),
                Err(_) => warn!(url, "Link preview timed out"),
            }
        }

        ChatMessage {
            id: raw.id_string().unwrap_or_else(|| Uuid::new_v4().to_string()),
            content,
            sender_id: sender_id.to_string(),
            username: self.locale.role_name(role).to_string(),
            role,
            date: local.format(self.locale.date_format()).to_string(),
            timestamp: local.format(self.locale.time_format()).to_string(),
            sent: role.is_own_side(),
            files,
            sources: raw.sources.clone().filter(|s| !s.is_null()),
        }
    }

    pub fn resolve_role(&self, label: &RoleLabel) -> SenderRole {
        label
            .label_for(self.locale)
            .map(|l| self.roles.resolve(l))
            .unwrap_or(SenderRole::Unknown)
    }
}

/// Message text; anything that is not a string renders as empty.
pub fn extract_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

/// First HTTP(S) URL in `text`, without trailing punctuation.
pub fn find_url(text: &str) -> Option<&str> {
    URL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']']))
}

/// Parses a server timestamp as UTC. Naive timestamps are taken as UTC;
/// numbers are Unix seconds (or milliseconds when large).
pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => {
            let n = n.as_i64()?;
            if n.abs() >= 1_000_000_000_000 {
                DateTime::from_timestamp_millis(n)
            } else {
                DateTime::from_timestamp(n, 0)
            }
        }
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
