use atrium_core::models::{Category, CreateCategoryRequest, UpdateCategoryRequest};
use atrium_core::{AppError, Pagination};
use sqlx::{PgPool, Postgres};

/// Repository for content categories
#[derive(Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "categories", db.operation = "insert"))]
    pub async fn create(&self, request: &CreateCategoryRequest) -> Result<Category, AppError> {
        let category = sqlx::query_as::<Postgres, Category>(
            r#"
            INSERT INTO categories (name, description, position)
            VALUES ($1, $2, COALESCE((SELECT MAX(position) + 1 FROM categories), 0))
            RETURNING id, name, description
            "#,
        )
        .bind(request.name.trim())
        .bind(&request.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select", db.record_id = id))]
    pub async fn get(&self, id: i64) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<Postgres, Category>(
            "SELECT id, name, description FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Every category in display order.
    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select"))]
    pub async fn list_all(&self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<Postgres, Category>(
            "SELECT id, name, description FROM categories ORDER BY position ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// One page of categories, optionally restricted to `allowed` ids.
    #[tracing::instrument(skip(self, allowed), fields(db.table = "categories", db.operation = "select"))]
    pub async fn list(
        &self,
        pagination: Pagination,
        allowed: Option<&[i64]>,
    ) -> Result<(Vec<Category>, i64), AppError> {
        let allowed: Option<Vec<i64>> = allowed.map(<[i64]>::to_vec);

        let categories = sqlx::query_as::<Postgres, Category>(
            r#"
            SELECT id, name, description FROM categories
            WHERE ($1::BIGINT[] IS NULL OR id = ANY($1))
            ORDER BY position ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&allowed)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM categories WHERE ($1::BIGINT[] IS NULL OR id = ANY($1))",
        )
        .bind(&allowed)
        .fetch_one(&self.pool)
        .await?;

        Ok((categories, total))
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "categories", db.operation = "update", db.record_id = id))]
    pub async fn update(
        &self,
        id: i64,
        request: &UpdateCategoryRequest,
    ) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<Postgres, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description
            "#,
        )
        .bind(id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Delete a category together with its content and grants.
    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "delete", db.record_id = id))]
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select"))]
    pub async fn exists(&self, id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
