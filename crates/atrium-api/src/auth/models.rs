use atrium_core::models::UserRole;
use atrium_core::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::error::HttpAppError;
use crate::state::DbState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: i64, // user id
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, stored in request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// `None` when authenticated with the master API key
    pub user_id: Option<i64>,
    pub role: UserRole,
}

impl AuthContext {
    pub fn master() -> Self {
        Self {
            user_id: None,
            role: UserRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn require_admin(&self) -> Result<(), HttpAppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator role required".to_string()).into())
        }
    }

    /// Account id of the caller; the master key has none.
    pub fn require_user(&self) -> Result<i64, HttpAppError> {
        self.user_id.ok_or_else(|| {
            AppError::BadRequest("This operation requires a user account token".to_string()).into()
        })
    }

    /// Category ids the caller may see. `None` means unrestricted.
    pub async fn category_filter(&self, db: &DbState) -> Result<Option<Vec<i64>>, HttpAppError> {
        if self.is_admin() {
            return Ok(None);
        }
        match self.user_id {
            Some(user_id) => Ok(Some(db.users.list_grants(user_id).await?)),
            None => Ok(Some(Vec::new())),
        }
    }
}

// Extracted from request parts so it works alongside Multipart
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthContext>().cloned().ok_or_else(|| {
            HttpAppError(AppError::Unauthorized(
                "Missing authentication context".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_context_is_admin_without_user() {
        let ctx = AuthContext::master();
        assert!(ctx.is_admin());
        assert!(ctx.require_admin().is_ok());
        assert!(ctx.require_user().is_err());
    }

    #[test]
    fn member_is_not_admin() {
        let ctx = AuthContext {
            user_id: Some(7),
            role: UserRole::Member,
        };
        assert!(ctx.require_admin().is_err());
        assert_eq!(ctx.require_user().unwrap(), 7);
    }
}
