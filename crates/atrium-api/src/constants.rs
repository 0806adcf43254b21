//! API constants

/// Prefix of every JSON route
pub const API_PREFIX: &str = "/api";

/// Route under which the local storage backend's files are served
pub const MEDIA_ROUTE: &str = "/media";

/// Header Telegram sends with the secret configured on `setWebhook`
pub const TELEGRAM_SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Maximum length of a Telegram message body
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;
