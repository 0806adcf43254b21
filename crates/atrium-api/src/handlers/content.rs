//! CRUD for audio, PDF and video items. The kind comes from the path
//! (`/api/audio`, `/api/pdfs`, `/api/videos`).

use std::sync::Arc;

use atrium_core::models::{
    ContentItem, ContentKind, ContentQuery, CreateContentRequest, UpdateContentRequest,
};
use atrium_core::{AppError, Page};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::access::{load_visible_item, parse_kind};
use crate::state::AppState;

fn check_cover(kind: ContentKind, cover_url: Option<&String>) -> Result<(), HttpAppError> {
    if cover_url.is_some() && kind != ContentKind::Pdf {
        return Err(AppError::InvalidInput(format!(
            "{} items cannot have a cover image",
            kind.label()
        ))
        .into());
    }
    Ok(())
}

async fn check_category(state: &AppState, category_id: i64) -> Result<(), HttpAppError> {
    if !state.db.categories.exists(category_id).await? {
        return Err(AppError::InvalidInput(format!("Category {} does not exist", category_id)).into());
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/{kind}",
    tag = "content",
    params(
        ("kind" = String, Path, description = "audio, pdfs or videos"),
        ContentQuery
    ),
    responses(
        (status = 200, description = "Items visible to the caller", body = Page<ContentItem>),
        (status = 404, description = "Unknown kind", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(kind = %kind, user_id = ?ctx.user_id, operation = "list_content"))]
pub async fn list_content(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(kind): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let kind = parse_kind(&kind)?;
    let pagination = query.pagination();
    let allowed = ctx.category_filter(&state.db).await?;

    let (items, total) = state
        .db
        .content
        .list(kind, query.category_id, allowed.as_deref(), pagination)
        .await?;

    Ok(Json(Page::new(items, total, pagination)))
}

#[utoipa::path(
    post,
    path = "/api/{kind}",
    tag = "content",
    params(("kind" = String, Path, description = "audio, pdfs or videos")),
    request_body = CreateContentRequest,
    responses(
        (status = 201, description = "Item created", body = ContentItem),
        (status = 400, description = "Invalid input or unknown category", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(kind = %kind, operation = "create_content"))]
pub async fn create_content(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(kind): Path<String>,
    ValidatedJson(request): ValidatedJson<CreateContentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let kind = parse_kind(&kind)?;
    check_cover(kind, request.cover_url.as_ref())?;
    check_category(&state, request.category_id).await?;

    let item = state.db.content.create(kind, &request).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/api/{kind}/{id}",
    tag = "content",
    params(
        ("kind" = String, Path, description = "audio, pdfs or videos"),
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item found", body = ContentItem),
        (status = 404, description = "Item not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(kind = %kind, item_id = id, operation = "get_content"))]
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let kind = parse_kind(&kind)?;
    let item = load_visible_item(&ctx, &state.db, kind, id).await?;
    Ok(Json(item))
}

#[utoipa::path(
    put,
    path = "/api/{kind}/{id}",
    tag = "content",
    params(
        ("kind" = String, Path, description = "audio, pdfs or videos"),
        ("id" = i64, Path, description = "Item ID")
    ),
    request_body = UpdateContentRequest,
    responses(
        (status = 200, description = "Item updated", body = ContentItem),
        (status = 404, description = "Item not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(kind = %kind, item_id = id, operation = "update_content"))]
pub async fn update_content(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path((kind, id)): Path<(String, i64)>,
    ValidatedJson(request): ValidatedJson<UpdateContentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let kind = parse_kind(&kind)?;
    check_cover(kind, request.cover_url.as_ref())?;
    if let Some(category_id) = request.category_id {
        check_category(&state, category_id).await?;
    }

    let item = state
        .db
        .content
        .update(kind, id, &request)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", kind.label())))?;

    Ok(Json(item))
}

#[utoipa::path(
    delete,
    path = "/api/{kind}/{id}",
    tag = "content",
    params(
        ("kind" = String, Path, description = "audio, pdfs or videos"),
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(kind = %kind, item_id = id, operation = "delete_content"))]
pub async fn delete_content(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let kind = parse_kind(&kind)?;

    if !state.db.content.delete(kind, id).await? {
        return Err(AppError::NotFound(format!("{} not found", kind.label())).into());
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pdfs_take_covers() {
        let cover = "https://cdn.test/cover.png".to_string();
        assert!(check_cover(ContentKind::Pdf, Some(&cover)).is_ok());
        assert!(check_cover(ContentKind::Audio, Some(&cover)).is_err());
        assert!(check_cover(ContentKind::Video, None).is_ok());
    }
}
