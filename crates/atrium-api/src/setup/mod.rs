//! Application setup: everything `main` needs before it can serve.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use atrium_core::Config;

use crate::auth::password::hash_password;
use crate::state::AppState;

/// Validate config, connect to Postgres and storage, bootstrap the admin
/// account and build the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.environment());

    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = Arc::new(AppState::new(config.clone(), pool, storage)?);
    bootstrap_admin(&state).await?;

    let router = routes::setup_routes(state.clone())?;

    Ok((state, router))
}

/// Create the `ADMIN_EMAIL` account if no account with that email exists.
async fn bootstrap_admin(state: &AppState) -> Result<()> {
    let (Some(email), Some(password)) = (
        state.config.admin_email(),
        state.config.admin_password(),
    ) else {
        tracing::debug!("No bootstrap administrator configured");
        return Ok(());
    };

    let password_hash = hash_password(password)?;
    let created = state
        .db
        .users
        .ensure_admin(email, &password_hash)
        .await
        .context("Failed to bootstrap administrator account")?;

    if created {
        tracing::info!(email = %email, "Bootstrap administrator created");
    } else {
        tracing::debug!(email = %email, "Bootstrap administrator already present");
    }
    Ok(())
}
