//! Startup checks that go beyond parsing.

use anyhow::Result;
use atrium_core::Config;

/// Fail fast on settings that are unsafe or unusable.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.is_production() && config.cors_origins().iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production. \
            Set specific allowed origins via CORS_ORIGINS."
        ));
    }

    if config.db_max_connections() == 0 {
        return Err(anyhow::anyhow!("Database max connections cannot be 0"));
    }
    if config.db_timeout_seconds() == 0 {
        return Err(anyhow::anyhow!("Database timeout cannot be 0"));
    }
    if config.jwt_expiry_hours() <= 0 {
        return Err(anyhow::anyhow!("JWT_EXPIRY_HOURS must be positive"));
    }

    match config.master_api_key() {
        Some(key) if key.len() < 32 => {
            return Err(anyhow::anyhow!(
                "MASTER_API_KEY must be at least 32 characters long"
            ));
        }
        None => tracing::info!("MASTER_API_KEY not set; only session tokens are accepted"),
        _ => {}
    }

    if config.telegram_bot_token().is_none() {
        tracing::warn!("TELEGRAM_BOT_TOKEN not set; sending requires a target bot token in settings");
    }
    if config.telegram_webhook_secret().is_none() {
        tracing::warn!("TELEGRAM_WEBHOOK_SECRET not set; the webhook accepts unauthenticated calls");
    }

    Ok(())
}
