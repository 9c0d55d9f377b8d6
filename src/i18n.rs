use std::str::FromStr;

use crate::errors::ClientError;
use crate::models::SenderRole;

/// UI language. Drives date formatting, role display names and toast texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ru => "ru",
        }
    }

    /// `chrono` format string for the date part of a message.
    pub fn date_format(&self) -> &'static str {
        match self {
            Locale::En => "%m/%d/%Y",
            Locale::Ru => "%d.%m.%Y",
        }
    }

    /// `chrono` format string for the time part of a message.
    pub fn time_format(&self) -> &'static str {
        match self {
            Locale::En => "%I:%M %p",
            Locale::Ru => "%H:%M",
        }
    }

    pub fn role_name(&self, role: SenderRole) -> &'static str {
        match (self, role) {
            (Locale::En, SenderRole::Client) => "Client",
            (Locale::En, SenderRole::Ai) => "AI Assistant",
            (Locale::En, SenderRole::Consultant) => "Consultant",
            (Locale::En, SenderRole::Unknown) => "Unknown",
            (Locale::Ru, SenderRole::Client) => "Клиент",
            (Locale::Ru, SenderRole::Ai) => "ИИ-ассистент",
            (Locale::Ru, SenderRole::Consultant) => "Консультант",
            (Locale::Ru, SenderRole::Unknown) => "Неизвестно",
        }
    }

    pub fn typing_indicator(&self) -> &'static str {
        match self {
            Locale::En => "Consultant is typing...",
            Locale::Ru => "Консультант печатает...",
        }
    }

    pub fn refresh_succeeded(&self) -> &'static str {
        match self {
            Locale::En => "A new chat has been started",
            Locale::Ru => "Новый чат создан",
        }
    }

    pub fn refresh_failed(&self) -> &'static str {
        match self {
            Locale::En => "Could not start a new chat",
            Locale::Ru => "Не удалось создать новый чат",
        }
    }

    pub fn start_failed(&self) -> &'static str {
        match self {
            Locale::En => "Could not connect to the chat",
            Locale::Ru => "Не удалось подключиться к чату",
        }
    }
}

impl FromStr for Locale {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            "ru" | "ru-ru" => Ok(Locale::Ru),
            other => Err(ClientError::config("CHAT_LOCALE", other)),
        }
    }
}

/// Maps free-form role labels (in any supported language) to a canonical role.
#[derive(Debug, Clone)]
pub struct RoleTable {
    aliases: Vec<(String, SenderRole)>,
}

impl Default for RoleTable {
    fn default() -> Self {
        let aliases = [
            ("client", SenderRole::Client),
            ("user", SenderRole::Client),
            ("клиент", SenderRole::Client),
            ("пользователь", SenderRole::Client),
            ("ai", SenderRole::Ai),
            ("ai assistant", SenderRole::Ai),
            ("assistant", SenderRole::Ai),
            ("bot", SenderRole::Ai),
            ("ии", SenderRole::Ai),
            ("ии-ассистент", SenderRole::Ai),
            ("ассистент", SenderRole::Ai),
            ("consultant", SenderRole::Consultant),
            ("operator", SenderRole::Consultant),
            ("manager", SenderRole::Consultant),
            ("консультант", SenderRole::Consultant),
            ("оператор", SenderRole::Consultant),
            ("менеджер", SenderRole::Consultant),
        ];
        Self {
            aliases: aliases.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

impl RoleTable {
    pub fn resolve(&self, label: &str) -> SenderRole {
        let label = label.trim().to_lowercase();
        self.aliases
            .iter()
            .find(|(k, _)| *k == label)
            .map(|(_, role)| *role)
            .unwrap_or(SenderRole::Unknown)
    }
}
