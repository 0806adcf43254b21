use atrium_core::models::{ContentItem, ContentKind, CreateContentRequest, UpdateContentRequest};
use atrium_core::{AppError, Pagination};
use sqlx::{PgPool, Postgres};

const SELECT_ITEM: &str = r#"
    SELECT c.id, c.kind, c.title, c.file_url, c.cover_url, c.category_id,
           cat.name AS category_name, c.created_at
    FROM content_items c
    JOIN categories cat ON cat.id = c.category_id
"#;

/// Repository for audio, PDF and video items
#[derive(Clone)]
pub struct ContentRepository {
    pool: PgPool,
}

impl ContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "content_items", db.operation = "insert", kind = %kind))]
    pub async fn create(
        &self,
        kind: ContentKind,
        request: &CreateContentRequest,
    ) -> Result<ContentItem, AppError> {
        let item = sqlx::query_as::<Postgres, ContentItem>(
            r#"
            WITH inserted AS (
                INSERT INTO content_items (kind, title, file_url, cover_url, category_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, kind, title, file_url, cover_url, category_id, created_at
            )
            SELECT i.id, i.kind, i.title, i.file_url, i.cover_url, i.category_id,
                   cat.name AS category_name, i.created_at
            FROM inserted i
            JOIN categories cat ON cat.id = i.category_id
            "#,
        )
        .bind(kind)
        .bind(request.title.trim())
        .bind(&request.file_url)
        .bind(&request.cover_url)
        .bind(request.category_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(id = item.id, category_id = item.category_id, "Content item created");

        Ok(item)
    }

    #[tracing::instrument(skip(self), fields(db.table = "content_items", db.operation = "select", db.record_id = id))]
    pub async fn get(&self, kind: ContentKind, id: i64) -> Result<Option<ContentItem>, AppError> {
        let item = sqlx::query_as::<Postgres, ContentItem>(&format!(
            "{} WHERE c.kind = $1 AND c.id = $2",
            SELECT_ITEM
        ))
        .bind(kind)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// One page of items, newest id last.
    ///
    /// `allowed` restricts the result to granted categories; `None` means
    /// unrestricted.
    #[tracing::instrument(skip(self, allowed), fields(db.table = "content_items", db.operation = "select", kind = %kind))]
    pub async fn list(
        &self,
        kind: ContentKind,
        category_id: Option<i64>,
        allowed: Option<&[i64]>,
        pagination: Pagination,
    ) -> Result<(Vec<ContentItem>, i64), AppError> {
        let allowed: Option<Vec<i64>> = allowed.map(<[i64]>::to_vec);

        let items = sqlx::query_as::<Postgres, ContentItem>(&format!(
            r#"{}
            WHERE c.kind = $1
              AND ($2::BIGINT IS NULL OR c.category_id = $2)
              AND ($3::BIGINT[] IS NULL OR c.category_id = ANY($3))
            ORDER BY c.id ASC
            LIMIT $4 OFFSET $5"#,
            SELECT_ITEM
        ))
        .bind(kind)
        .bind(category_id)
        .bind(&allowed)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>(
            r#"
            SELECT COUNT(*) FROM content_items c
            WHERE c.kind = $1
              AND ($2::BIGINT IS NULL OR c.category_id = $2)
              AND ($3::BIGINT[] IS NULL OR c.category_id = ANY($3))
            "#,
        )
        .bind(kind)
        .bind(category_id)
        .bind(&allowed)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    /// Every item of a kind; input to the grouped preview.
    #[tracing::instrument(skip(self), fields(db.table = "content_items", db.operation = "select", kind = %kind))]
    pub async fn list_all(&self, kind: ContentKind) -> Result<Vec<ContentItem>, AppError> {
        let items = sqlx::query_as::<Postgres, ContentItem>(&format!(
            "{} WHERE c.kind = $1 ORDER BY c.id ASC",
            SELECT_ITEM
        ))
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "content_items", db.operation = "update", db.record_id = id))]
    pub async fn update(
        &self,
        kind: ContentKind,
        id: i64,
        request: &UpdateContentRequest,
    ) -> Result<Option<ContentItem>, AppError> {
        let item = sqlx::query_as::<Postgres, ContentItem>(
            r#"
            WITH updated AS (
                UPDATE content_items
                SET title = COALESCE($3, title),
                    file_url = COALESCE($4, file_url),
                    cover_url = COALESCE($5, cover_url),
                    category_id = COALESCE($6, category_id),
                    updated_at = NOW()
                WHERE kind = $1 AND id = $2
                RETURNING id, kind, title, file_url, cover_url, category_id, created_at
            )
            SELECT u.id, u.kind, u.title, u.file_url, u.cover_url, u.category_id,
                   cat.name AS category_name, u.created_at
            FROM updated u
            JOIN categories cat ON cat.id = u.category_id
            "#,
        )
        .bind(kind)
        .bind(id)
        .bind(request.title.as_deref().map(str::trim))
        .bind(&request.file_url)
        .bind(&request.cover_url)
        .bind(request.category_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    #[tracing::instrument(skip(self), fields(db.table = "content_items", db.operation = "delete", db.record_id = id))]
    pub async fn delete(&self, kind: ContentKind, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM content_items WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
