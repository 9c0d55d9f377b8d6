use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::i18n::Locale;

// ── Roles ─────────────────────────────────────────────────────────────────────

/// Canonical author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Client,
    Ai,
    Consultant,
    Unknown,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Client => "client",
            SenderRole::Ai => "ai",
            SenderRole::Consultant => "consultant",
            SenderRole::Unknown => "unknown",
        }
    }

    /// Messages written by the assistant or a consultant are rendered on the own side.
    pub fn is_own_side(&self) -> bool {
        matches!(self, SenderRole::Ai | SenderRole::Consultant)
    }
}

impl std::fmt::Display for SenderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `sender_role` as it arrives on the wire, decoded once.
///
/// The server sends either a plain label, a JSON-encoded label (`"\"Client\""`)
/// or a JSON-encoded object keyed by locale (`{"en":"Client","ru":"Клиент"}`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoleLabel {
    #[default]
    Missing,
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl RoleLabel {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::String(inner)) => RoleLabel::Plain(inner),
                Ok(Value::Object(map)) => Self::localized(map),
                _ => RoleLabel::Plain(raw),
            },
            Value::Object(map) => Self::localized(map),
            _ => RoleLabel::Missing,
        }
    }

    fn localized(map: serde_json::Map<String, Value>) -> Self {
        let labels: BTreeMap<String, String> = map
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect();
        if labels.is_empty() {
            RoleLabel::Missing
        } else {
            RoleLabel::Localized(labels)
        }
    }

    /// Picks the label for `locale`, falling back to English and then to any entry.
    pub fn label_for(&self, locale: Locale) -> Option<&str> {
        match self {
            RoleLabel::Missing => None,
            RoleLabel::Plain(s) => Some(s.as_str()),
            RoleLabel::Localized(map) => map
                .get(locale.code())
                .or_else(|| map.get(Locale::En.code()))
                .or_else(|| map.values().next())
                .map(String::as_str),
        }
    }
}

impl<'de> Deserialize<'de> for RoleLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(RoleLabel::from_value(Value::deserialize(deserializer)?))
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// Link metadata returned by the preview proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPreview {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, alias = "site_name")]
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, alias = "file_name", alias = "filename")]
    pub name: Option<String>,
    #[serde(default, alias = "file_url", alias = "file")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<LinkPreview>,
}

impl Attachment {
    pub fn from_preview(preview: LinkPreview) -> Self {
        Self {
            name: preview.title.clone(),
            url: preview.url.clone(),
            preview: Some(preview),
        }
    }
}

/// A message as the server stores it. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub sender_role: RoleLabel,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default, deserialize_with = "de_attachments")]
    pub files: Option<Vec<Attachment>>,
    #[serde(default)]
    pub sources: Option<Value>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub choice_options: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de_bool")]
    pub choice_strict: Option<bool>,
}

impl RawMessage {
    /// Server id as text; numbers are rendered in decimal.
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub sender_id: String,
    pub username: String,
    pub role: SenderRole,
    pub date: String,
    pub timestamp: String,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<Attachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Value>,
}

// ── Wire frames ──────────────────────────────────────────────────────────────

/// Frame sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    StatusCheck,
    GetMessages {
        #[serde(skip_serializing_if = "Option::is_none")]
        with_enter: Option<bool>,
    },
    NewMessage { message: String },
}

impl OutboundFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frame received from the server (internally tagged on `type`).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    StatusCheck {
        #[serde(default, deserialize_with = "de_seconds")]
        remaining_time: Option<u64>,
        #[serde(default, deserialize_with = "de_bool")]
        manual_mode: Option<bool>,
    },
    GetMessages {
        #[serde(default)]
        messages: Vec<RawMessage>,
        #[serde(default, deserialize_with = "de_seconds")]
        remaining_time: Option<u64>,
    },
    NewMessage(RawMessage),
    TypingUsers {
        #[serde(default)]
        users: Vec<Value>,
    },
    Attention {
        #[serde(default)]
        message: Value,
    },
    Error {
        #[serde(default)]
        message: Value,
    },
    #[serde(other)]
    Unknown,
}

/// Lifecycle of the session's WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closed,
}

// ── Lenient field decoders ───────────────────────────────────────────────────

fn de_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.ceil() as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f.ceil() as u64),
        _ => None,
    })
}

fn de_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

fn de_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

fn de_attachments<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<Attachment>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| serde_json::from_value::<Attachment>(v).ok())
                .filter(|a| !a.url.is_empty())
                .collect(),
        ),
        _ => None,
    })
}
