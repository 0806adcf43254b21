use atrium_core::models::{User, UserRecord, UserRole};
use atrium_core::{AppError, Pagination};
use sqlx::{PgPool, Postgres};

use super::transaction::with_transaction;

const USER_COLUMNS: &str = "id, email, name, role, is_active, created_at";

/// Fields of an account update; `None` leaves the column unchanged.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

/// Repository for accounts and their category grants
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, password_hash), fields(db.table = "users", db.operation = "insert"))]
    pub async fn create(
        &self,
        email: &str,
        name: Option<&str>,
        role: UserRole,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            r#"
            INSERT INTO users (email, name, role, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(email.trim())
        .bind(name)
        .bind(role)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = id))]
    pub async fn get(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Account with credential, looked up case-insensitively.
    #[tracing::instrument(skip(self, email), fields(db.table = "users", db.operation = "select"))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, UserRecord>(&format!(
            "SELECT {}, password_hash FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn list(&self, pagination: Pagination) -> Result<(Vec<User>, i64), AppError> {
        let users = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {} FROM users ORDER BY id ASC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok((users, total))
    }

    #[tracing::instrument(skip(self, changes), fields(db.table = "users", db.operation = "update", db.record_id = id))]
    pub async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.email.as_deref().map(str::trim))
        .bind(&changes.name)
        .bind(changes.role)
        .bind(changes.is_active)
        .bind(&changes.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "delete", db.record_id = id))]
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Create an administrator with `email` unless an account with that email
    /// already exists. Returns whether a row was inserted.
    #[tracing::instrument(skip(self, password_hash), fields(db.table = "users", db.operation = "insert"))]
    pub async fn ensure_admin(&self, email: &str, password_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, role, password_hash)
            SELECT $1, 'admin', $2
            WHERE NOT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))
            "#,
        )
        .bind(email.trim())
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Granted category ids in ascending order.
    #[tracing::instrument(skip(self), fields(db.table = "user_category_access", db.operation = "select"))]
    pub async fn list_grants(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, i64>(
            "SELECT category_id FROM user_category_access WHERE user_id = $1 ORDER BY category_id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Atomically replace the user's grant set.
    #[tracing::instrument(skip(self, category_ids), fields(db.table = "user_category_access", db.operation = "replace", grant_count = category_ids.len()))]
    pub async fn replace_grants(
        &self,
        user_id: i64,
        category_ids: Vec<i64>,
    ) -> Result<Vec<i64>, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                sqlx::query("DELETE FROM user_category_access WHERE user_id = $1")
                    .bind(user_id)
                    .execute(&mut **tx)
                    .await?;

                sqlx::query(
                    r#"
                    INSERT INTO user_category_access (user_id, category_id)
                    SELECT $1, UNNEST($2::BIGINT[])
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(&category_ids)
                .execute(&mut **tx)
                .await?;

                let ids = sqlx::query_scalar::<Postgres, i64>(
                    "SELECT category_id FROM user_category_access WHERE user_id = $1 ORDER BY category_id ASC",
                )
                .bind(user_id)
                .fetch_all(&mut **tx)
                .await?;

                Ok::<_, AppError>(ids)
            })
        })
        .await
    }

    /// Returns `false` if the grant already existed.
    #[tracing::instrument(skip(self), fields(db.table = "user_category_access", db.operation = "insert"))]
    pub async fn add_grant(&self, user_id: i64, category_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_category_access (user_id, category_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_category_access", db.operation = "delete"))]
    pub async fn remove_grant(&self, user_id: i64, category_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM user_category_access WHERE user_id = $1 AND category_id = $2",
        )
        .bind(user_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
