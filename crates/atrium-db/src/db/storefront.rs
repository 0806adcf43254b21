use atrium_core::models::{
    compute_total, CreateProductRequest, Order, OrderStatus, Product, UpdateProductRequest,
};
use atrium_core::{AppError, Pagination};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres};

use super::transaction::with_transaction;

const PRODUCT_COLUMNS: &str = "id, name, description, price, currency, image_url, category_id, stock, is_active, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, user_id, product_id, quantity, unit_price, total, status, created_at";

/// Repository for the storefront catalog
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "products", db.operation = "insert"))]
    pub async fn create(&self, request: &CreateProductRequest) -> Result<Product, AppError> {
        let product = sqlx::query_as::<Postgres, Product>(&format!(
            r#"
            INSERT INTO products (name, description, price, currency, image_url, category_id, stock, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.currency)
        .bind(&request.image_url)
        .bind(request.category_id)
        .bind(request.stock)
        .bind(request.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    #[tracing::instrument(skip(self), fields(db.table = "products", db.operation = "select", db.record_id = id))]
    pub async fn get(&self, id: i64) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<Postgres, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// One page of products; `active_only` hides deactivated entries.
    #[tracing::instrument(skip(self), fields(db.table = "products", db.operation = "select"))]
    pub async fn list(
        &self,
        pagination: Pagination,
        active_only: bool,
    ) -> Result<(Vec<Product>, i64), AppError> {
        let products = sqlx::query_as::<Postgres, Product>(&format!(
            r#"
            SELECT {} FROM products
            WHERE (NOT $1 OR is_active)
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(active_only)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM products WHERE (NOT $1 OR is_active)",
        )
        .bind(active_only)
        .fetch_one(&self.pool)
        .await?;

        Ok((products, total))
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "products", db.operation = "update", db.record_id = id))]
    pub async fn update(
        &self,
        id: i64,
        request: &UpdateProductRequest,
    ) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<Postgres, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                currency = COALESCE($5, currency),
                image_url = COALESCE($6, image_url),
                category_id = COALESCE($7, category_id),
                stock = COALESCE($8, stock),
                is_active = COALESCE($9, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.currency)
        .bind(&request.image_url)
        .bind(request.category_id)
        .bind(request.stock)
        .bind(request.is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Products referenced by orders cannot be deleted; deactivate them instead.
    #[tracing::instrument(skip(self), fields(db.table = "products", db.operation = "delete", db.record_id = id))]
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(
                        "Product has orders; deactivate it instead of deleting".to_string(),
                    )
                }
                other => AppError::from(other),
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(FromRow)]
struct LockedProduct {
    price: Decimal,
    stock: i32,
    is_active: bool,
}

/// Repository for storefront orders
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Place an order in one transaction.
    ///
    /// The product row is locked with `FOR UPDATE`; inactive products and
    /// insufficient stock are rejected before stock is decremented.
    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "insert"))]
    pub async fn place_order(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<Order, AppError> {
        let order = with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let product = sqlx::query_as::<Postgres, LockedProduct>(
                    "SELECT price, stock, is_active FROM products WHERE id = $1 FOR UPDATE",
                )
                .bind(product_id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

                if !product.is_active {
                    return Err(AppError::BadRequest(
                        "Product is not available for purchase".to_string(),
                    ));
                }

                if product.stock < quantity {
                    return Err(AppError::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available: product.stock,
                    });
                }

                sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
                    .bind(product_id)
                    .bind(quantity)
                    .execute(&mut **tx)
                    .await?;

                let order = sqlx::query_as::<Postgres, Order>(&format!(
                    r#"
                    INSERT INTO orders (user_id, product_id, quantity, unit_price, total)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {}
                    "#,
                    ORDER_COLUMNS
                ))
                .bind(user_id)
                .bind(product_id)
                .bind(quantity)
                .bind(product.price)
                .bind(compute_total(product.price, quantity))
                .fetch_one(&mut **tx)
                .await?;

                Ok::<_, AppError>(order)
            })
        })
        .await?;

        tracing::info!(
            order_id = order.id,
            product_id,
            quantity,
            total = %order.total,
            "Order placed"
        );

        Ok(order)
    }

    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "select", db.record_id = id))]
    pub async fn get(&self, id: i64) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<Postgres, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Newest first; `user_id` restricts to one customer.
    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "select"))]
    pub async fn list(
        &self,
        pagination: Pagination,
        user_id: Option<i64>,
    ) -> Result<(Vec<Order>, i64), AppError> {
        let orders = sqlx::query_as::<Postgres, Order>(&format!(
            r#"
            SELECT {} FROM orders
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM orders WHERE ($1::BIGINT IS NULL OR user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((orders, total))
    }

    /// Move an order to `status`. Cancelling returns the quantity to stock.
    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "update", db.record_id = id))]
    pub async fn update_status(&self, id: i64, status: OrderStatus) -> Result<Order, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let current = sqlx::query_as::<Postgres, Order>(&format!(
                    "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
                    ORDER_COLUMNS
                ))
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

                if current.status == status {
                    return Ok(current);
                }

                if !current.status.can_transition_to(status) {
                    return Err(AppError::Conflict(format!(
                        "Cannot change order from {:?} to {:?}",
                        current.status, status
                    )));
                }

                if status == OrderStatus::Cancelled {
                    sqlx::query(
                        "UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
                    )
                    .bind(current.product_id)
                    .bind(current.quantity)
                    .execute(&mut **tx)
                    .await?;
                }

                let order = sqlx::query_as::<Postgres, Order>(&format!(
                    "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
                    ORDER_COLUMNS
                ))
                .bind(id)
                .bind(status)
                .fetch_one(&mut **tx)
                .await?;

                Ok::<_, AppError>(order)
            })
        })
        .await
    }
}
