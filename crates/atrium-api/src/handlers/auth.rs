use std::sync::Arc;

use atrium_core::models::{LoginRequest, LoginResponse, User};
use atrium_core::AppError;
use axum::{extract::State, response::IntoResponse, Json};

use crate::auth::password::verify_password;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued", body = LoginResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "login"))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let record = state
        .db
        .users
        .find_by_email(&request.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&request.password, &record.password_hash)? {
        tracing::info!(user_id = record.id, "Login rejected: wrong password");
        return Err(invalid().into());
    }

    if !record.is_active {
        return Err(AppError::Forbidden("Account is disabled".to_string()).into());
    }

    let (token, expires_at) = state.auth.jwt.issue(record.id, record.role)?;
    tracing::info!(user_id = record.id, role = ?record.role, "User logged in");

    Ok(Json(LoginResponse {
        token,
        expires_at,
        user: User::from(record),
    }))
}
