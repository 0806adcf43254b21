use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use atrium_core::AppError;
use subtle::ConstantTimeEq;

use crate::auth::models::AuthContext;
use crate::error::HttpAppError;
use crate::state::AuthConfig;

pub(crate) fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized(message: &str) -> Response {
    HttpAppError(AppError::Unauthorized(message.to_string())).into_response()
}

/// Accepts `Authorization: Bearer <token>` where the token is either a
/// session JWT or the configured master API key.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => {
            tracing::debug!("Rejected request without authorization header");
            return unauthorized("Missing authorization header");
        }
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return unauthorized("Invalid authorization header format");
    };
    let token = token.trim();

    if let Some(master_key) = auth.master_api_key.as_deref() {
        if secure_compare(token, master_key) {
            request.extensions_mut().insert(AuthContext::master());
            return next.run(request).await;
        }
    }

    match auth.jwt.verify(token) {
        Ok(claims) => {
            tracing::debug!(user_id = claims.sub, role = ?claims.role, "Authenticated request");
            request.extensions_mut().insert(AuthContext {
                user_id: Some(claims.sub),
                role: claims.role,
            });
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected request with invalid token");
            unauthorized("Invalid or expired token")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_compare_requires_exact_match() {
        assert!(secure_compare("abc", "abc"));
        assert!(!secure_compare("abc", "abd"));
        assert!(!secure_compare("abc", "abcd"));
    }
}
