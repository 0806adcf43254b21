use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Relay configuration, one row per installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TelegramSettings {
    /// Token of the bot messages are forwarded through; the main bot is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bot_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub forwarding_keywords: Vec<String>,
}

impl TelegramSettings {
    /// Settings as returned to clients, with the bot token masked.
    pub fn redacted(&self) -> Self {
        Self {
            target_bot_token: self.target_bot_token.as_deref().map(mask_token),
            ..self.clone()
        }
    }
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{}…", visible)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateTelegramSettingsRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255))]
    pub target_bot_token: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub target_chat_id: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub forwarding_keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "telegram_direction", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum TelegramDirection {
    Inbound,
    Outbound,
    Forwarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "telegram_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum TelegramStatus {
    Sent,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TelegramLog {
    pub id: i64,
    pub direction: TelegramDirection,
    pub chat_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_keyword: Option<String>,
    pub status: TelegramStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a log row before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTelegramLog {
    pub direction: TelegramDirection,
    pub chat_id: String,
    pub text: String,
    pub matched_keyword: Option<String>,
    pub status: TelegramStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 64))]
    pub chat_id: String,
    #[validate(length(min = 1, max = 4096, message = "Message must be 1-4096 characters"))]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageResponse {
    pub status: TelegramStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

/// The subset of a Bot API `Update` the relay reads.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub channel_post: Option<TelegramMessage>,
}

impl TelegramUpdate {
    pub fn message(&self) -> Option<&TelegramMessage> {
        self.message.as_ref().or(self.channel_post.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl TelegramMessage {
    /// Message text, falling back to a media caption.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// First forwarding keyword contained in `text`, compared case-insensitively.
/// Blank keywords never match.
pub fn match_keyword<'a>(text: &str, keywords: &'a [String]) -> Option<&'a str> {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .find(|k| haystack.contains(&k.to_lowercase()))
}
