use std::sync::Arc;

use atrium_core::models::{
    CreateOrderRequest, CreateProductRequest, Order, Product, UpdateOrderStatusRequest,
    UpdateProductRequest,
};
use atrium_core::{AppError, Page, PageQuery};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

async fn check_product_category(
    state: &AppState,
    category_id: Option<i64>,
) -> Result<(), HttpAppError> {
    if let Some(id) = category_id {
        if !state.db.categories.exists(id).await? {
            return Err(AppError::InvalidInput(format!("Category {} does not exist", id)).into());
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/storefront/products",
    tag = "storefront",
    params(PageQuery),
    responses(
        (status = 200, description = "All products, including inactive ones", body = Page<Product>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(operation = "list_products"))]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let pagination = query.pagination();
    let (products, total) = state.db.products.list(pagination, false).await?;
    Ok(Json(Page::new(products, total, pagination)))
}

#[utoipa::path(
    post,
    path = "/api/storefront/products",
    tag = "storefront",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "create_product"))]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    ValidatedJson(request): ValidatedJson<CreateProductRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    check_product_category(&state, request.category_id).await?;

    let product = state.db.products.create(&request).await?;
    tracing::info!(product_id = product.id, price = %product.price, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    get,
    path = "/api/storefront/products/{id}",
    tag = "storefront",
    params(("id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(product_id = id, operation = "get_product"))]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let product = state
        .db
        .products
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(Json(product))
}

#[utoipa::path(
    put,
    path = "/api/storefront/products/{id}",
    tag = "storefront",
    params(("id" = i64, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 404, description = "Product not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(product_id = id, operation = "update_product"))]
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateProductRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    check_product_category(&state, request.category_id).await?;

    let product = state
        .db
        .products
        .update(id, &request)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/api/storefront/products/{id}",
    tag = "storefront",
    params(("id" = i64, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 409, description = "Product has orders", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(product_id = id, operation = "delete_product"))]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    if !state.db.products.delete(id).await? {
        return Err(AppError::NotFound("Product not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Active products, for any signed-in user.
#[utoipa::path(
    get,
    path = "/api/storefront/catalog",
    tag = "storefront",
    params(PageQuery),
    responses((status = 200, description = "Active products", body = Page<Product>))
)]
#[tracing::instrument(skip(state, query), fields(operation = "catalog"))]
pub async fn catalog(
    State(state): State<Arc<AppState>>,
    _ctx: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let pagination = query.pagination();
    let (products, total) = state.db.products.list(pagination, true).await?;
    Ok(Json(Page::new(products, total, pagination)))
}

#[utoipa::path(
    post,
    path = "/api/storefront/orders",
    tag = "storefront",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = Order),
        (status = 400, description = "Inactive product or invalid quantity", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 409, description = "Insufficient stock", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(user_id = ?ctx.user_id, operation = "place_order"))]
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    ValidatedJson(request): ValidatedJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user_id = ctx.require_user()?;

    let order = state
        .db
        .orders
        .place_order(user_id, request.product_id, request.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    get,
    path = "/api/storefront/orders",
    tag = "storefront",
    params(PageQuery),
    responses(
        (status = 200, description = "All orders, newest first", body = Page<Order>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(operation = "list_orders"))]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let pagination = query.pagination();
    let (orders, total) = state.db.orders.list(pagination, None).await?;
    Ok(Json(Page::new(orders, total, pagination)))
}

#[utoipa::path(
    get,
    path = "/api/storefront/orders/mine",
    tag = "storefront",
    params(PageQuery),
    responses((status = 200, description = "The caller's orders, newest first", body = Page<Order>))
)]
#[tracing::instrument(skip(state, query), fields(user_id = ?ctx.user_id, operation = "my_orders"))]
pub async fn my_orders(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user_id = ctx.require_user()?;
    let pagination = query.pagination();
    let (orders, total) = state.db.orders.list(pagination, Some(user_id)).await?;
    Ok(Json(Page::new(orders, total, pagination)))
}

/// Move an order along `pending -> paid -> cancelled`. Cancelling returns
/// the quantity to stock.
#[utoipa::path(
    put,
    path = "/api/storefront/orders/{id}/status",
    tag = "storefront",
    params(("id" = i64, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Order),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(order_id = id, operation = "update_order_status"))]
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;
    let order = state.db.orders.update_status(id, request.status).await?;
    tracing::info!(order_id = id, status = ?order.status, "Order status updated");
    Ok(Json(order))
}
