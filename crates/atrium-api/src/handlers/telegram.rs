use std::sync::Arc;

use atrium_core::models::{
    NewTelegramLog, SendMessageRequest, SendMessageResponse, TelegramDirection, TelegramLog,
    TelegramSettings, TelegramStatus, TelegramUpdate, UpdateTelegramSettingsRequest,
};
use atrium_core::{AppError, Page, PageQuery};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::auth::middleware::secure_compare;
use crate::auth::AuthContext;
use crate::constants::TELEGRAM_SECRET_HEADER;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::telegram::relay_update;
use crate::state::{AppState, TelegramState};

#[utoipa::path(
    get,
    path = "/api/telegram/settings",
    tag = "telegram",
    responses(
        (status = 200, description = "Relay settings with the bot token masked", body = TelegramSettings),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_telegram_settings"))]
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let settings = state.db.telegram.get_settings().await?;
    Ok(Json(settings.redacted()))
}

/// Merge the given fields into the stored settings. Omitted fields keep
/// their value.
#[utoipa::path(
    put,
    path = "/api/telegram/settings",
    tag = "telegram",
    request_body = UpdateTelegramSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = TelegramSettings),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "update_telegram_settings"))]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    ValidatedJson(request): ValidatedJson<UpdateTelegramSettingsRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let settings = state.db.telegram.update_settings(&request).await?;
    tracing::info!(
        keywords = settings.forwarding_keywords.len(),
        has_target_chat = settings.target_chat_id.is_some(),
        "Telegram settings updated"
    );
    Ok(Json(settings.redacted()))
}

#[utoipa::path(
    post,
    path = "/api/telegram/send",
    tag = "telegram",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = SendMessageResponse),
        (status = 400, description = "No bot token configured", body = ErrorResponse),
        (status = 502, description = "Telegram rejected the message", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(chat_id = %request.chat_id, operation = "send_telegram_message"))]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    ValidatedJson(request): ValidatedJson<SendMessageRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;

    let bot_token = match state.telegram.default_bot_token.clone() {
        Some(token) => token,
        None => state
            .db
            .telegram
            .get_settings()
            .await?
            .target_bot_token
            .ok_or_else(|| AppError::BadRequest("No Telegram bot token configured".to_string()))?,
    };

    let result = state
        .telegram
        .client
        .send_message(&bot_token, &request.chat_id, &request.text)
        .await;

    let (status, error) = match &result {
        Ok(_) => (TelegramStatus::Sent, None),
        Err(e) => (TelegramStatus::Failed, Some(e.to_string())),
    };
    state
        .db
        .telegram
        .insert_log(&NewTelegramLog {
            direction: TelegramDirection::Outbound,
            chat_id: request.chat_id.clone(),
            text: request.text.clone(),
            matched_keyword: None,
            status,
            error,
        })
        .await?;

    let message_id = result?;
    Ok(Json(SendMessageResponse {
        status: TelegramStatus::Sent,
        message_id: Some(message_id),
    }))
}

fn webhook_authorized(telegram: &TelegramState, headers: &HeaderMap) -> bool {
    let Some(expected) = telegram.webhook_secret.as_deref() else {
        return true;
    };
    headers
        .get(TELEGRAM_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|given| secure_compare(given, expected))
}

/// Bot API webhook. Public; authenticated by the secret token header when
/// one is configured. Always answers 200 once authorized so Telegram does
/// not redeliver.
#[utoipa::path(
    post,
    path = "/api/telegram/webhook",
    tag = "telegram",
    request_body = TelegramUpdate,
    responses(
        (status = 200, description = "Update processed"),
        (status = 401, description = "Secret token mismatch", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, update), fields(update_id = update.update_id, operation = "telegram_webhook"))]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !webhook_authorized(&state.telegram, &headers) {
        tracing::warn!("Rejected webhook call with bad secret token");
        return Err(AppError::Unauthorized("Invalid webhook secret".to_string()).into());
    }

    match relay_update(
        &state.db.telegram,
        &state.telegram.client,
        state.telegram.default_bot_token.as_deref(),
        &update,
    )
    .await
    {
        Ok(logs) => tracing::debug!(logs = logs.len(), "Update relayed"),
        Err(e) => tracing::error!(error = %e, "Failed to relay update"),
    }

    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/api/telegram/logs",
    tag = "telegram",
    params(PageQuery),
    responses(
        (status = 200, description = "Relay log, newest first", body = Page<TelegramLog>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(operation = "list_telegram_logs"))]
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let pagination = query.pagination();
    let (logs, total) = state.db.telegram.list_logs(pagination).await?;
    Ok(Json(Page::new(logs, total, pagination)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::telegram::TelegramClient;

    fn telegram(secret: Option<&str>) -> TelegramState {
        TelegramState {
            client: TelegramClient::new("http://127.0.0.1:9").unwrap(),
            default_bot_token: None,
            webhook_secret: secret.map(String::from),
        }
    }

    #[test]
    fn webhook_secret_is_optional() {
        assert!(webhook_authorized(&telegram(None), &HeaderMap::new()));
    }

    #[test]
    fn webhook_secret_must_match() {
        let state = telegram(Some("s3cret"));
        let mut headers = HeaderMap::new();
        assert!(!webhook_authorized(&state, &headers));

        headers.insert(TELEGRAM_SECRET_HEADER, "wrong".parse().unwrap());
        assert!(!webhook_authorized(&state, &headers));

        headers.insert(TELEGRAM_SECRET_HEADER, "s3cret".parse().unwrap());
        assert!(webhook_authorized(&state, &headers));
    }
}
