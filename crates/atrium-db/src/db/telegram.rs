use atrium_core::models::{
    NewTelegramLog, TelegramLog, TelegramSettings, UpdateTelegramSettingsRequest,
};
use atrium_core::{AppError, Pagination};
use sqlx::{PgPool, Postgres};

const SETTINGS_COLUMNS: &str = "target_bot_token, target_chat_id, webhook_url, forwarding_keywords";
const LOG_COLUMNS: &str = "id, direction, chat_id, text, matched_keyword, status, error, created_at";

/// Repository for relay settings and the message log
#[derive(Clone)]
pub struct TelegramRepository {
    pool: PgPool,
}

impl TelegramRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "telegram_settings", db.operation = "select"))]
    pub async fn get_settings(&self) -> Result<TelegramSettings, AppError> {
        let settings = sqlx::query_as::<Postgres, TelegramSettings>(&format!(
            "SELECT {} FROM telegram_settings WHERE id = 1",
            SETTINGS_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings.unwrap_or_default())
    }

    /// Apply the given changes; keywords are trimmed and blank ones dropped.
    #[tracing::instrument(skip(self, request), fields(db.table = "telegram_settings", db.operation = "upsert"))]
    pub async fn update_settings(
        &self,
        request: &UpdateTelegramSettingsRequest,
    ) -> Result<TelegramSettings, AppError> {
        let keywords: Option<Vec<String>> = request.forwarding_keywords.as_ref().map(|list| {
            list.iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        });

        let settings = sqlx::query_as::<Postgres, TelegramSettings>(&format!(
            r#"
            INSERT INTO telegram_settings (id, target_bot_token, target_chat_id, webhook_url, forwarding_keywords)
            VALUES (1, $1, $2, $3, COALESCE($4, '{{}}'::TEXT[]))
            ON CONFLICT (id) DO UPDATE
            SET target_bot_token = COALESCE($1, telegram_settings.target_bot_token),
                target_chat_id = COALESCE($2, telegram_settings.target_chat_id),
                webhook_url = COALESCE($3, telegram_settings.webhook_url),
                forwarding_keywords = COALESCE($4, telegram_settings.forwarding_keywords),
                updated_at = NOW()
            RETURNING {}
            "#,
            SETTINGS_COLUMNS
        ))
        .bind(&request.target_bot_token)
        .bind(&request.target_chat_id)
        .bind(&request.webhook_url)
        .bind(&keywords)
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }

    #[tracing::instrument(skip(self, log), fields(db.table = "telegram_logs", db.operation = "insert", direction = ?log.direction))]
    pub async fn insert_log(&self, log: &NewTelegramLog) -> Result<TelegramLog, AppError> {
        let row = sqlx::query_as::<Postgres, TelegramLog>(&format!(
            r#"
            INSERT INTO telegram_logs (direction, chat_id, text, matched_keyword, status, error)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            LOG_COLUMNS
        ))
        .bind(log.direction)
        .bind(&log.chat_id)
        .bind(&log.text)
        .bind(&log.matched_keyword)
        .bind(log.status)
        .bind(&log.error)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Newest first.
    #[tracing::instrument(skip(self), fields(db.table = "telegram_logs", db.operation = "select"))]
    pub async fn list_logs(
        &self,
        pagination: Pagination,
    ) -> Result<(Vec<TelegramLog>, i64), AppError> {
        let logs = sqlx::query_as::<Postgres, TelegramLog>(&format!(
            "SELECT {} FROM telegram_logs ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            LOG_COLUMNS
        ))
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM telegram_logs")
            .fetch_one(&self.pool)
            .await?;

        Ok((logs, total))
    }
}
