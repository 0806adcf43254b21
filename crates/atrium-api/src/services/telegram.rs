//! Telegram Bot API client and the inbound relay.

use std::time::Duration;

use anyhow::Context;
use atrium_core::models::{
    match_keyword, NewTelegramLog, TelegramDirection, TelegramLog, TelegramSettings,
    TelegramStatus, TelegramUpdate,
};
use atrium_core::AppError;
use atrium_db::TelegramRepository;
use serde::{Deserialize, Serialize};

use crate::constants::TELEGRAM_MAX_MESSAGE_LEN;

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<SentMessage>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Thin client for `sendMessage` on the Bot HTTP API.
#[derive(Clone)]
pub struct TelegramClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl TelegramClient {
    pub fn new(api_base: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client for Telegram")?;

        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Send `text` to `chat_id` with `bot_token`; returns Telegram's message id.
    #[tracing::instrument(skip(self, bot_token, text), fields(chat_id = %chat_id, text_len = text.len()))]
    pub async fn send_message(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<i64, AppError> {
        let text = truncate(text, TELEGRAM_MAX_MESSAGE_LEN);

        let response = self
            .http_client
            .post(format!("{}/bot{}/sendMessage", self.api_base, bot_token))
            .json(&SendMessageBody { chat_id, text })
            .send()
            .await
            .map_err(|e| {
                AppError::Upstream(format!("Telegram request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body: BotApiResponse = response.json().await.map_err(|e| {
            AppError::Upstream(format!(
                "Failed to parse Telegram response ({}): {}",
                status,
                e.without_url()
            ))
        })?;

        if !body.ok {
            return Err(AppError::Upstream(format!(
                "Telegram rejected message ({}): {}",
                status,
                body.description.unwrap_or_else(|| "no description".to_string())
            )));
        }

        body.result
            .map(|m| m.message_id)
            .ok_or_else(|| AppError::Upstream("Telegram response without result".to_string()))
    }
}

/// Cut `text` to at most `max` characters on a char boundary.
fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// What to do with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardDecision {
    /// No keyword matched
    Ignore,
    /// A keyword matched but no target bot or chat is configured
    Skip { keyword: String, reason: String },
    Forward {
        keyword: String,
        bot_token: String,
        chat_id: String,
    },
}

/// Decide whether `text` is forwarded under `settings`.
///
/// The target bot token falls back to the server's own bot token.
pub fn forwarding_decision(
    settings: &TelegramSettings,
    text: &str,
    default_bot_token: Option<&str>,
) -> ForwardDecision {
    let Some(keyword) = match_keyword(text, &settings.forwarding_keywords) else {
        return ForwardDecision::Ignore;
    };
    let keyword = keyword.to_string();

    let bot_token = settings
        .target_bot_token
        .as_deref()
        .or(default_bot_token)
        .filter(|t| !t.is_empty());

    match (bot_token, settings.target_chat_id.as_deref()) {
        (Some(bot_token), Some(chat_id)) if !chat_id.is_empty() => ForwardDecision::Forward {
            keyword,
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        },
        (None, _) => ForwardDecision::Skip {
            keyword,
            reason: "No target bot token configured".to_string(),
        },
        _ => ForwardDecision::Skip {
            keyword,
            reason: "No target chat configured".to_string(),
        },
    }
}

/// Log an inbound update and forward it when a keyword matches.
///
/// Returns the log rows written. Updates without a text body are ignored.
#[tracing::instrument(skip_all, fields(update_id = update.update_id))]
pub async fn relay_update(
    repo: &TelegramRepository,
    client: &TelegramClient,
    default_bot_token: Option<&str>,
    update: &TelegramUpdate,
) -> Result<Vec<TelegramLog>, AppError> {
    let Some(message) = update.message() else {
        tracing::debug!("Update without message, ignoring");
        return Ok(Vec::new());
    };
    let Some(text) = message.body() else {
        tracing::debug!("Message without text, ignoring");
        return Ok(Vec::new());
    };
    let source_chat = message.chat.id.to_string();

    let settings = repo.get_settings().await?;
    let decision = forwarding_decision(&settings, text, default_bot_token);

    let matched_keyword = match &decision {
        ForwardDecision::Ignore => None,
        ForwardDecision::Skip { keyword, .. } | ForwardDecision::Forward { keyword, .. } => {
            Some(keyword.clone())
        }
    };

    let mut logs = vec![
        repo.insert_log(&NewTelegramLog {
            direction: TelegramDirection::Inbound,
            chat_id: source_chat,
            text: text.to_string(),
            matched_keyword,
            status: TelegramStatus::Sent,
            error: None,
        })
        .await?,
    ];

    match decision {
        ForwardDecision::Ignore => {}
        ForwardDecision::Skip { keyword, reason } => {
            tracing::warn!(keyword = %keyword, reason = %reason, "Keyword matched but forwarding is not configured");
            logs.push(
                repo.insert_log(&NewTelegramLog {
                    direction: TelegramDirection::Forwarded,
                    chat_id: settings.target_chat_id.clone().unwrap_or_default(),
                    text: text.to_string(),
                    matched_keyword: Some(keyword),
                    status: TelegramStatus::Skipped,
                    error: Some(reason),
                })
                .await?,
            );
        }
        ForwardDecision::Forward {
            keyword,
            bot_token,
            chat_id,
        } => {
            let (status, error) = match client.send_message(&bot_token, &chat_id, text).await {
                Ok(message_id) => {
                    tracing::info!(keyword = %keyword, message_id, "Message forwarded");
                    (TelegramStatus::Sent, None)
                }
                Err(e) => {
                    tracing::warn!(keyword = %keyword, error = %e, "Failed to forward message");
                    (TelegramStatus::Failed, Some(e.to_string()))
                }
            };
            logs.push(
                repo.insert_log(&NewTelegramLog {
                    direction: TelegramDirection::Forwarded,
                    chat_id,
                    text: text.to_string(),
                    matched_keyword: Some(keyword),
                    status,
                    error,
                })
                .await?,
            );
        }
    }

    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    fn settings(keywords: &[&str]) -> TelegramSettings {
        TelegramSettings {
            target_bot_token: Some("target-token".to_string()),
            target_chat_id: Some("-100200".to_string()),
            webhook_url: None,
            forwarding_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn unmatched_text_is_ignored() {
        let decision = forwarding_decision(&settings(&["urgent"]), "hello there", None);
        assert_eq!(decision, ForwardDecision::Ignore);
    }

    #[test]
    fn matched_text_is_forwarded_case_insensitively() {
        let decision = forwarding_decision(&settings(&["urgent"]), "This is URGENT!", None);
        assert_eq!(
            decision,
            ForwardDecision::Forward {
                keyword: "urgent".to_string(),
                bot_token: "target-token".to_string(),
                chat_id: "-100200".to_string(),
            }
        );
    }

    #[test]
    fn default_bot_token_is_used_when_target_has_none() {
        let mut s = settings(&["sale"]);
        s.target_bot_token = None;
        match forwarding_decision(&s, "big sale today", Some("server-token")) {
            ForwardDecision::Forward { bot_token, .. } => assert_eq!(bot_token, "server-token"),
            other => panic!("Expected Forward, got {:?}", other),
        }
    }

    #[test]
    fn missing_target_chat_skips() {
        let mut s = settings(&["sale"]);
        s.target_chat_id = None;
        assert!(matches!(
            forwarding_decision(&s, "sale", None),
            ForwardDecision::Skip { .. }
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 10), "short");
    }

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn send_message_returns_message_id() {
        let router = Router::new().route(
            "/botTOKEN/sendMessage",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["chat_id"], "-100200");
                Json(json!({"ok": true, "result": {"message_id": 77}}))
            }),
        );
        let base = spawn_stub(router).await;

        let client = TelegramClient::new(&base).unwrap();
        let id = client.send_message("TOKEN", "-100200", "hi").await.unwrap();
        assert_eq!(id, 77);
    }

    #[tokio::test]
    async fn rejected_message_is_upstream_error() {
        let router = Router::new().route(
            "/botTOKEN/sendMessage",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({"ok": false, "description": "chat not found"})),
                )
            }),
        );
        let base = spawn_stub(router).await;

        let client = TelegramClient::new(&base).unwrap();
        let err = client.send_message("TOKEN", "1", "hi").await.unwrap_err();
        match err {
            AppError::Upstream(msg) => assert!(msg.contains("chat not found")),
            other => panic!("Expected Upstream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_bot_token() {
        let client = TelegramClient::new("http://127.0.0.1:1").unwrap();
        let err = client
            .send_message("123456:SECRET-TOKEN", "1", "hi")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(!message.contains("SECRET-TOKEN"), "token leaked: {}", message);
    }

    #[tokio::test]
    async fn malformed_responses_do_not_leak_the_bot_token() {
        let router = Router::new().fallback(|| async { "<html>bad gateway</html>" });
        let base = spawn_stub(router).await;

        let client = TelegramClient::new(&base).unwrap();
        let err = client
            .send_message("123456:SECRET-TOKEN", "1", "hi")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Failed to parse Telegram response"));
        assert!(!message.contains("SECRET-TOKEN"), "token leaked: {}", message);
    }
}
