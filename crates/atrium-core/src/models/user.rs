use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Account row including the credential; never serialized to clients.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub password_hash: String,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            email: record.email,
            name: record.name,
            role: record.role,
            is_active: record.is_active,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[serde(default = "default_role")]
    pub role: UserRole,
    /// Initial category grants
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

fn default_role() -> UserRole {
    UserRole::Member
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Replacement grant list for `PUT /api/users/{id}/categories`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GrantSet {
    pub category_ids: Vec<i64>,
}

impl GrantSet {
    /// Sorted and deduplicated ids.
    pub fn normalized(&self) -> Vec<i64> {
        self.category_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Caller identity and effective grants.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub role: UserRole,
    /// `None` means unrestricted (administrators)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_ids: Option<Vec<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_set_normalizes() {
        let grants = GrantSet {
            category_ids: vec![3, 1, 3, 2],
        };
        assert_eq!(grants.normalized(), vec![1, 2, 3]);
    }

    #[test]
    fn create_user_defaults_to_member() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"email":"a@b.io","password":"hunter22!"}"#).unwrap();
        assert_eq!(req.role, UserRole::Member);
        assert!(req.category_ids.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_user_rejects_bad_email() {
        let req = CreateUserRequest {
            email: "not-an-email".to_string(),
            password: "longenough".to_string(),
            name: None,
            role: UserRole::Admin,
            category_ids: vec![],
        };
        assert!(req.validate().is_err());
    }
}
