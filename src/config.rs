use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::api::endpoint::Endpoint;
use crate::errors::ClientError;
use crate::i18n::{Locale, RoleTable};

const DEFAULT_ORIGIN: &str = "http://localhost";
const DEFAULT_TYPING_BOT_ID: &str = "bot";
const DEFAULT_RECONNECT_MIN_SECS: u64 = 5;

/// What to do when the hosting window regains focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Dropped sockets stay dropped until the user refreshes.
    #[default]
    Never,
    /// Re-open (or re-check) the socket on focus, at most once per `min_interval`.
    OnFocus { min_interval: Duration },
}

/// Everything a chat session needs to know about its environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the hosting page, e.g. `https://crm.example.com`.
    pub origin: String,
    pub locale: Locale,
    /// Offset used when rendering message dates.
    pub utc_offset: FixedOffset,
    /// Connects as an administrator when set.
    pub admin_token: Option<String>,
    pub reconnect: ReconnectPolicy,
    /// Identifier that marks the consultant in `typing_users` frames.
    pub typing_bot_id: String,
    pub roles: RoleTable,
    /// Skip `get_chat` and join this chat directly.
    pub chat_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            locale: Locale::default(),
            utc_offset: Utc.fix(),
            admin_token: None,
            reconnect: ReconnectPolicy::default(),
            typing_bot_id: DEFAULT_TYPING_BOT_ID.to_string(),
            roles: RoleTable::default(),
            chat_id: None,
        }
    }
}

impl ClientConfig {
    /// Reads `CHAT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = ClientConfig::default();

        if let Some(origin) = get("CHAT_ORIGIN") {
            config.origin = origin;
        }
        if let Some(locale) = get("CHAT_LOCALE") {
            config.locale = locale.parse()?;
        }
        if let Some(offset) = get("CHAT_UTC_OFFSET_MINUTES") {
            let minutes: i32 = offset
                .parse()
                .map_err(|_| ClientError::config("CHAT_UTC_OFFSET_MINUTES", offset.as_str()))?;
            config.utc_offset = FixedOffset::east_opt(minutes * 60)
                .ok_or_else(|| ClientError::config("CHAT_UTC_OFFSET_MINUTES", offset.as_str()))?;
        }
        config.admin_token = get("CHAT_ADMIN_TOKEN");

        let min_secs = match get("CHAT_RECONNECT_MIN_SECS") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| ClientError::config("CHAT_RECONNECT_MIN_SECS", v.as_str()))?,
            None => DEFAULT_RECONNECT_MIN_SECS,
        };
        if let Some(policy) = get("CHAT_RECONNECT") {
            config.reconnect = match policy.to_lowercase().as_str() {
                "never" | "none" => ReconnectPolicy::Never,
                "focus" | "on_focus" => ReconnectPolicy::OnFocus {
                    min_interval: Duration::from_secs(min_secs),
                },
                _ => return Err(ClientError::config("CHAT_RECONNECT", policy)),
            };
        }
        if let Some(bot) = get("CHAT_TYPING_BOT_ID") {
            config.typing_bot_id = bot;
        }
        config.chat_id = get("CHAT_ID");

        // Fail early on an unusable origin.
        config.endpoint()?;
        Ok(config)
    }

    pub fn endpoint(&self) -> Result<Endpoint, ClientError> {
        Endpoint::from_origin(&self.origin)
    }

    pub fn is_admin(&self) -> bool {
        self.admin_token.is_some()
    }
}
