use std::sync::Arc;

use atrium_core::viewer::{self, MediaSource, ViewerPlan, ViewerTransform};
use axum::{
    extract::{Path, Query, State},
    http::{header::USER_AGENT, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::access::{load_visible_item, parse_kind};
use crate::state::AppState;

/// Upper bound on replayed errors; the chain is exhausted after two anyway.
const MAX_REPLAYED_ERRORS: u32 = 8;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ViewerQuery {
    /// Zoom factor, snapped to 0.5..=3.0 in 0.25 steps
    #[serde(default)]
    pub scale: Option<f64>,
    /// Rotation in degrees, normalised to a multiple of 90
    #[serde(default)]
    pub rotation: Option<i64>,
    /// Number of load errors the client already hit
    #[serde(default)]
    pub errors: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/viewer/{kind}/{id}",
    tag = "content",
    params(
        ("kind" = String, Path, description = "audio, pdfs or videos"),
        ("id" = i64, Path, description = "Item ID"),
        ViewerQuery
    ),
    responses(
        (status = 200, description = "Render plan for the caller's device", body = ViewerPlan),
        (status = 404, description = "Item not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, query), fields(kind = %kind, item_id = id, operation = "viewer_plan"))]
pub async fn viewer_plan(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path((kind, id)): Path<(String, i64)>,
    Query(query): Query<ViewerQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let kind = parse_kind(&kind)?;
    let item = load_visible_item(&ctx, &state.db, kind, id).await?;

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let transform = ViewerTransform::new(
        query.scale.unwrap_or(1.0),
        query.rotation.unwrap_or(0),
    );
    let errors = query.errors.unwrap_or(0).min(MAX_REPLAYED_ERRORS);

    let plan = viewer::plan(MediaSource::from_item(&item), user_agent, errors, transform);
    tracing::debug!(
        format = ?plan.format,
        initial = ?plan.initial,
        current = ?plan.current,
        mobile = plan.device.mobile,
        "Viewer plan computed"
    );

    Ok(Json(plan))
}
