//! Route table and middleware stack

use std::sync::Arc;

use atrium_core::Config;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::auth_middleware;
use crate::constants::{API_PREFIX, MEDIA_ROUTE};
use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Multipart framing on top of the largest allowed file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the full application router.
pub fn setup_routes(state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(&state.config)?;
    let body_limit = state.config.max_upload_bytes() + MULTIPART_OVERHEAD_BYTES;

    let protected = protected_routes().layer(axum::middleware::from_fn_with_state(
        state.auth.clone(),
        auth_middleware,
    ));

    let app = public_routes()
        .merge(protected)
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        HeaderName::from_static("x-request-id"),
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
    };
    Ok(cors)
}

/// Health checks, docs, login, the Telegram webhook and stored media.
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/live", get(handlers::health::liveness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .route(
            &format!("{}/auth/login", API_PREFIX),
            post(handlers::auth::login),
        )
        .route(
            &format!("{}/telegram/webhook", API_PREFIX),
            post(handlers::telegram::webhook),
        )
        .route(
            &format!("{}/{{*key}}", MEDIA_ROUTE),
            get(handlers::storage::serve_media),
        )
}

fn protected_routes() -> Router<Arc<AppState>> {
    use handlers::{
        categories, content, preview, storage, storefront, telegram, users, viewer,
    };

    let p = |path: &str| format!("{}{}", API_PREFIX, path);

    Router::new()
        // Categories
        .route(
            &p("/categories"),
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            &p("/categories/{id}"),
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Uploads, preview and viewer
        .route(&p("/storage/upload"), post(storage::upload_file))
        .route(&p("/preview/{kind}"), get(preview::preview))
        .route(&p("/viewer/{kind}/{id}"), get(viewer::viewer_plan))
        // Users and grants
        .route(&p("/me"), get(users::me))
        .route(&p("/users"), get(users::list_users).post(users::create_user))
        .route(
            &p("/users/{id}"),
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            &p("/users/{id}/categories"),
            get(users::get_grants).put(users::replace_grants),
        )
        .route(
            &p("/users/{id}/categories/{category_id}"),
            post(users::add_grant).delete(users::remove_grant),
        )
        // Storefront
        .route(
            &p("/storefront/products"),
            get(storefront::list_products).post(storefront::create_product),
        )
        .route(
            &p("/storefront/products/{id}"),
            get(storefront::get_product)
                .put(storefront::update_product)
                .delete(storefront::delete_product),
        )
        .route(&p("/storefront/catalog"), get(storefront::catalog))
        .route(
            &p("/storefront/orders"),
            get(storefront::list_orders).post(storefront::place_order),
        )
        .route(&p("/storefront/orders/mine"), get(storefront::my_orders))
        .route(
            &p("/storefront/orders/{id}/status"),
            put(storefront::update_order_status),
        )
        // Telegram relay
        .route(
            &p("/telegram/settings"),
            get(telegram::get_settings).put(telegram::update_settings),
        )
        .route(&p("/telegram/send"), post(telegram::send_message))
        .route(&p("/telegram/logs"), get(telegram::list_logs))
        // Content by kind; static prefixes above take precedence
        .route(
            &p("/{kind}"),
            get(content::list_content).post(content::create_content),
        )
        .route(
            &p("/{kind}/{id}"),
            get(content::get_content)
                .put(content::update_content)
                .delete(content::delete_content),
        )
}
