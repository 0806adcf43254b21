use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    pub storage: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db.pool)
        .await
        .is_ok();

    let body = HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
        storage: format!("{:?}", state.media.storage.backend_type()).to_lowercase(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body))
}

/// Process liveness; never touches dependencies.
pub async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
