//! Postgres pool and schema migrations

use std::time::Duration;

use anyhow::{Context, Result};
use atrium_core::Config;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let max_connections = config.db_max_connections();
    tracing::info!(max_connections, "Connecting to Postgres");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(10 * 60))
        .connect(config.database_url())
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Apply the embedded `migrations/` directory; already-applied versions are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!(
        migrations = MIGRATOR.iter().count(),
        "Database schema up to date"
    );
    Ok(())
}
