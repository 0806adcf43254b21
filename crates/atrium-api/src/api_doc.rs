//! OpenAPI document served at `/api/openapi.json`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use atrium_core::models;
use atrium_core::viewer;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Session token from /api/auth/login, or the master API key"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Atrium API",
        version = "0.1.0",
        description = "Content delivery and storefront admin backend: category-scoped audio, PDF and video content, user grants, orders and a Telegram relay."
    ),
    paths(
        handlers::health::health_check,
        handlers::auth::login,
        // Categories
        handlers::categories::list_categories,
        handlers::categories::create_category,
        handlers::categories::get_category,
        handlers::categories::update_category,
        handlers::categories::delete_category,
        // Content
        handlers::content::list_content,
        handlers::content::create_content,
        handlers::content::get_content,
        handlers::content::update_content,
        handlers::content::delete_content,
        handlers::preview::preview,
        handlers::viewer::viewer_plan,
        handlers::storage::upload_file,
        // Users
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::users::get_grants,
        handlers::users::replace_grants,
        handlers::users::add_grant,
        handlers::users::remove_grant,
        handlers::users::me,
        // Storefront
        handlers::storefront::list_products,
        handlers::storefront::create_product,
        handlers::storefront::get_product,
        handlers::storefront::update_product,
        handlers::storefront::delete_product,
        handlers::storefront::catalog,
        handlers::storefront::place_order,
        handlers::storefront::list_orders,
        handlers::storefront::my_orders,
        handlers::storefront::update_order_status,
        // Telegram
        handlers::telegram::get_settings,
        handlers::telegram::update_settings,
        handlers::telegram::send_message,
        handlers::telegram::webhook,
        handlers::telegram::list_logs,
    ),
    components(
        schemas(
            error::ErrorResponse,
            handlers::health::HealthResponse,
            models::Category,
            models::CreateCategoryRequest,
            models::UpdateCategoryRequest,
            models::CategoryGroup,
            models::ContentKind,
            models::ContentItem,
            models::CreateContentRequest,
            models::UpdateContentRequest,
            models::UploadResponse,
            models::User,
            models::UserRole,
            models::CreateUserRequest,
            models::UpdateUserRequest,
            models::GrantSet,
            models::LoginRequest,
            models::LoginResponse,
            models::MeResponse,
            models::Product,
            models::CreateProductRequest,
            models::UpdateProductRequest,
            models::Order,
            models::OrderStatus,
            models::CreateOrderRequest,
            models::UpdateOrderStatusRequest,
            models::TelegramSettings,
            models::UpdateTelegramSettingsRequest,
            models::TelegramDirection,
            models::TelegramStatus,
            models::TelegramLog,
            models::SendMessageRequest,
            models::SendMessageResponse,
            models::TelegramUpdate,
            models::TelegramMessage,
            models::TelegramChat,
            viewer::ViewerPlan,
            viewer::MediaSource,
            viewer::MediaFormat,
            viewer::VideoContainer,
            viewer::DeviceProfile,
            viewer::Browser,
            viewer::RenderStrategy,
            viewer::RenderOutput,
            viewer::Transition,
            viewer::ViewerTransform,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "auth", description = "Session tokens"),
        (name = "categories", description = "Content categories"),
        (name = "content", description = "Audio, PDF and video items, grouped preview and viewer plans"),
        (name = "storage", description = "File uploads"),
        (name = "users", description = "Accounts and category grants"),
        (name = "storefront", description = "Products and orders"),
        (name = "telegram", description = "Telegram bot relay"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_core_paths() {
        let doc = get_openapi_spec();
        for path in [
            "/api/auth/login",
            "/api/{kind}/{id}",
            "/api/preview/{kind}",
            "/api/storefront/orders",
            "/api/telegram/webhook",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
