use std::sync::Arc;

use atrium_core::load_groups;
use atrium_core::models::CategoryGroup;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::access::{effective_filter, parse_id_list, parse_kind};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PreviewQuery {
    /// Comma separated category ids, e.g. `1,2`
    #[serde(default)]
    pub categories: Option<String>,
}

/// Content of one kind grouped by category. Empty categories are omitted.
#[utoipa::path(
    get,
    path = "/api/preview/{kind}",
    tag = "content",
    params(
        ("kind" = String, Path, description = "audio, pdfs or videos"),
        PreviewQuery
    ),
    responses(
        (status = 200, description = "Grouped preview", body = Vec<CategoryGroup>),
        (status = 400, description = "Malformed category list", body = ErrorResponse),
        (status = 404, description = "Unknown kind", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(kind = %kind, user_id = ?ctx.user_id, operation = "preview"))]
pub async fn preview(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(kind): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let kind = parse_kind(&kind)?;
    let requested = query
        .categories
        .as_deref()
        .map(parse_id_list)
        .transpose()?;
    let filter = effective_filter(ctx.category_filter(&state.db).await?, requested);

    let groups = load_groups(
        state.db.content.list_all(kind),
        state.db.categories.list_all(),
        filter.as_deref(),
    )
    .await;

    tracing::debug!(groups = groups.len(), "Preview built");
    Ok(Json(groups))
}
