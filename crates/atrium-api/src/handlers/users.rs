//! Accounts and per-category access grants. Everything here is admin-only
//! except `GET /api/me`.

use std::sync::Arc;

use atrium_core::models::{
    CreateUserRequest, GrantSet, MeResponse, UpdateUserRequest, User,
};
use atrium_core::{AppError, Page, PageQuery};
use atrium_db::UserChanges;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::password::hash_password;
use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

async fn require_user_exists(state: &AppState, id: i64) -> Result<User, HttpAppError> {
    state
        .db
        .users
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()).into())
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(PageQuery),
    responses(
        (status = 200, description = "Users", body = Page<User>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(operation = "list_users"))]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let pagination = query.pagination();
    let (users, total) = state.db.users.list(pagination).await?;
    Ok(Json(Page::new(users, total, pagination)))
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input or unknown category", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "create_user"))]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;

    let password_hash = hash_password(&request.password)?;
    let user = state
        .db
        .users
        .create(
            &request.email,
            request.name.as_deref(),
            request.role,
            &password_hash,
        )
        .await?;

    if !request.category_ids.is_empty() {
        let grants = GrantSet {
            category_ids: request.category_ids.clone(),
        };
        if let Err(e) = state
            .db
            .users
            .replace_grants(user.id, grants.normalized())
            .await
        {
            // Do not leave an account behind with a half-applied grant set.
            if let Err(cleanup) = state.db.users.delete(user.id).await {
                tracing::error!(user_id = user.id, error = %cleanup, "Failed to remove user after grant error");
            }
            return Err(e.into());
        }
    }

    tracing::info!(user_id = user.id, role = ?user.role, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = id, operation = "get_user"))]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    Ok(Json(require_user_exists(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(user_id = id, operation = "update_user"))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;

    if ctx.user_id == Some(id) && (request.is_active == Some(false) || request.role.is_some_and(|r| !r.is_admin())) {
        return Err(AppError::BadRequest(
            "Administrators cannot disable or demote their own account".to_string(),
        )
        .into());
    }

    let password_hash = request.password.as_deref().map(hash_password).transpose()?;
    let changes = UserChanges {
        email: request.email,
        name: request.name,
        role: request.role,
        is_active: request.is_active,
        password_hash,
    };

    let user = state
        .db
        .users
        .update(id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete own account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = id, operation = "delete_user"))]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    if ctx.user_id == Some(id) {
        return Err(AppError::BadRequest("Administrators cannot delete their own account".to_string()).into());
    }

    if !state.db.users.delete(id).await? {
        return Err(AppError::NotFound("User not found".to_string()).into());
    }
    tracing::info!(user_id = id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/categories",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Granted category ids", body = GrantSet),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = id, operation = "get_grants"))]
pub async fn get_grants(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    require_user_exists(&state, id).await?;

    let category_ids = state.db.users.list_grants(id).await?;
    Ok(Json(GrantSet { category_ids }))
}

/// Replace the whole grant set. Unknown category ids fail the request and
/// leave the previous grants in place.
#[utoipa::path(
    put,
    path = "/api/users/{id}/categories",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    request_body = GrantSet,
    responses(
        (status = 200, description = "Grants replaced", body = GrantSet),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(user_id = id, operation = "replace_grants"))]
pub async fn replace_grants(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<GrantSet>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    require_user_exists(&state, id).await?;

    let category_ids = state
        .db
        .users
        .replace_grants(id, request.normalized())
        .await?;
    tracing::info!(user_id = id, grants = category_ids.len(), "Grants replaced");

    Ok(Json(GrantSet { category_ids }))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/categories/{category_id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID"),
        ("category_id" = i64, Path, description = "Category ID")
    ),
    responses(
        (status = 201, description = "Grant added"),
        (status = 204, description = "Grant already present"),
        (status = 404, description = "User or category not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = id, category_id = category_id, operation = "add_grant"))]
pub async fn add_grant(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path((id, category_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    require_user_exists(&state, id).await?;
    if !state.db.categories.exists(category_id).await? {
        return Err(AppError::NotFound("Category not found".to_string()).into());
    }

    let added = state.db.users.add_grant(id, category_id).await?;
    Ok(if added {
        StatusCode::CREATED
    } else {
        StatusCode::NO_CONTENT
    })
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/categories/{category_id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID"),
        ("category_id" = i64, Path, description = "Category ID")
    ),
    responses(
        (status = 204, description = "Grant removed"),
        (status = 404, description = "Grant not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = id, category_id = category_id, operation = "remove_grant"))]
pub async fn remove_grant(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path((id, category_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;

    if !state.db.users.remove_grant(id, category_id).await? {
        return Err(AppError::NotFound("Grant not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "users",
    responses(
        (status = 200, description = "Caller identity and grants", body = MeResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = ?ctx.user_id, operation = "me"))]
pub async fn me(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = match ctx.user_id {
        Some(id) => Some(require_user_exists(&state, id).await?),
        None => None,
    };
    let category_ids = ctx.category_filter(&state.db).await?;

    Ok(Json(MeResponse {
        user,
        role: ctx.role,
        category_ids,
    }))
}
