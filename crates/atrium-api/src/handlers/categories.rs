use std::sync::Arc;

use atrium_core::models::{Category, CreateCategoryRequest, UpdateCategoryRequest};
use atrium_core::{AppError, Page, PageQuery};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::access::ensure_category_visible;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "categories",
    params(PageQuery),
    responses(
        (status = 200, description = "Categories visible to the caller", body = Page<Category>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(user_id = ?ctx.user_id, operation = "list_categories"))]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let pagination = query.pagination();
    let allowed = ctx.category_filter(&state.db).await?;

    let (categories, total) = state
        .db
        .categories
        .list(pagination, allowed.as_deref())
        .await?;

    Ok(Json(Page::new(categories, total, pagination)))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 409, description = "Name already in use", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "create_category"))]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    ValidatedJson(request): ValidatedJson<CreateCategoryRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;

    let category = state.db.categories.create(&request).await?;
    tracing::info!(category_id = category.id, name = %category.name, "Category created");

    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category found", body = Category),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(category_id = id, operation = "get_category"))]
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ensure_category_visible(&ctx, &state.db, id).await?;

    let category = state
        .db
        .categories
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    Ok(Json(category))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(category_id = id, operation = "update_category"))]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;

    let category = state
        .db
        .categories
        .update(id, &request)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    Ok(Json(category))
}

/// Deleting a category removes its content rows and grants.
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(category_id = id, operation = "delete_category"))]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;

    if !state.db.categories.delete(id).await? {
        return Err(AppError::NotFound("Category not found".to_string()).into());
    }
    tracing::info!(category_id = id, "Category deleted");

    Ok(StatusCode::NO_CONTENT)
}
