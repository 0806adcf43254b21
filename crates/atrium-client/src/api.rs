//! Domain methods for the Atrium API client.
//!
//! Request and response types come from `atrium_core::models`.

use atrium_core::models::{
    Category, CategoryGroup, ContentItem, ContentKind, CreateCategoryRequest,
    CreateContentRequest, CreateOrderRequest, CreateProductRequest, CreateUserRequest,
    LoginRequest, LoginResponse, MeResponse, Order, Product, SendMessageRequest,
    SendMessageResponse, TelegramLog, UploadResponse, User,
};
use atrium_core::pagination::MAX_PAGE_SIZE;
use atrium_core::viewer::ViewerPlan;
use atrium_core::{ListPayload, Page};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::{ApiClient, ClientResult, API_PREFIX};

fn api(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

fn page_query(page: Option<i64>, limit: Option<i64>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(page) = page {
        query.push(("page", page.to_string()));
    }
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

impl ApiClient {
    /// Fetch every page of a list endpoint. Bare-array responses are taken
    /// as the complete list.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> ClientResult<Vec<T>> {
        let mut collected = Vec::new();
        let mut page = 1i64;

        loop {
            let mut query: Vec<(&str, String)> = extra.to_vec();
            query.push(("page", page.to_string()));
            query.push(("limit", MAX_PAGE_SIZE.to_string()));

            let payload: ListPayload<T> = self.get(path, &query).await?;
            let total = payload.total();
            let bare = matches!(payload, ListPayload::Bare(_));
            let items = payload.into_items();
            let fetched = items.len();
            collected.extend(items);

            if bare || fetched == 0 || collected.len() as i64 >= total {
                return Ok(collected);
            }
            page += 1;
        }
    }

    // Auth

    /// Exchange credentials for a session token. Does not change this
    /// client's token; use [`ApiClient::with_token`].
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<LoginResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post_json(&api("/auth/login"), &request).await
    }

    pub async fn me(&self) -> ClientResult<MeResponse> {
        self.get(&api("/me"), &[]).await
    }

    // Categories and content

    pub async fn list_categories(
        &self,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ClientResult<Page<Category>> {
        self.get(&api("/categories"), &page_query(page, limit)).await
    }

    pub async fn all_categories(&self) -> ClientResult<Vec<Category>> {
        self.fetch_all(&api("/categories"), &[]).await
    }

    pub async fn create_category(&self, request: &CreateCategoryRequest) -> ClientResult<Category> {
        self.post_json(&api("/categories"), request).await
    }

    pub async fn list_content(
        &self,
        kind: ContentKind,
        category_id: Option<i64>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ClientResult<Page<ContentItem>> {
        let mut query = page_query(page, limit);
        if let Some(category_id) = category_id {
            query.push(("category_id", category_id.to_string()));
        }
        self.get(&api(&format!("/{}", kind.path_segment())), &query)
            .await
    }

    pub async fn all_content(&self, kind: ContentKind) -> ClientResult<Vec<ContentItem>> {
        self.fetch_all(&api(&format!("/{}", kind.path_segment())), &[])
            .await
    }

    pub async fn create_content(
        &self,
        kind: ContentKind,
        request: &CreateContentRequest,
    ) -> ClientResult<ContentItem> {
        self.post_json(&api(&format!("/{}", kind.path_segment())), request)
            .await
    }

    pub async fn upload_file(
        &self,
        kind: ContentKind,
        filename: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> ClientResult<UploadResponse> {
        let mut part = reqwest::multipart::Part::bytes(data).file_name(filename.to_string());
        if let Some(content_type) = content_type {
            part = part.mime_str(content_type)?;
        }
        let form = reqwest::multipart::Form::new()
            .text("kind", kind.as_str().to_string())
            .part("file", part);

        self.post_multipart(&api("/storage/upload"), form).await
    }

    /// Server-side grouping; the caller's grants are applied by the API.
    pub async fn server_preview(
        &self,
        kind: ContentKind,
        categories: Option<&[i64]>,
    ) -> ClientResult<Vec<CategoryGroup>> {
        let mut query = Vec::new();
        if let Some(ids) = categories {
            let joined = ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            query.push(("categories", joined));
        }
        self.get(&api(&format!("/preview/{}", kind.path_segment())), &query)
            .await
    }

    pub async fn viewer_plan(
        &self,
        kind: ContentKind,
        id: i64,
        errors: u32,
    ) -> ClientResult<ViewerPlan> {
        self.get(
            &api(&format!("/viewer/{}/{}", kind.path_segment(), id)),
            &[("errors", errors.to_string())],
        )
        .await
    }

    // Users

    pub async fn list_users(
        &self,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ClientResult<Page<User>> {
        self.get(&api("/users"), &page_query(page, limit)).await
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> ClientResult<User> {
        self.post_json(&api("/users"), request).await
    }

    /// Returns `true` when the grant was new.
    pub async fn grant_category(&self, user_id: i64, category_id: i64) -> ClientResult<bool> {
        let status = self
            .post_empty(&api(&format!("/users/{}/categories/{}", user_id, category_id)))
            .await?;
        Ok(status == StatusCode::CREATED)
    }

    pub async fn revoke_category(&self, user_id: i64, category_id: i64) -> ClientResult<()> {
        self.delete(&api(&format!("/users/{}/categories/{}", user_id, category_id)))
            .await
    }

    // Storefront

    pub async fn list_products(
        &self,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ClientResult<Page<Product>> {
        self.get(&api("/storefront/products"), &page_query(page, limit))
            .await
    }

    pub async fn create_product(&self, request: &CreateProductRequest) -> ClientResult<Product> {
        self.post_json(&api("/storefront/products"), request).await
    }

    pub async fn place_order(&self, product_id: i64, quantity: i32) -> ClientResult<Order> {
        let request = CreateOrderRequest {
            product_id,
            quantity,
        };
        self.post_json(&api("/storefront/orders"), &request).await
    }

    // Telegram

    pub async fn send_telegram(
        &self,
        chat_id: &str,
        text: &str,
    ) -> ClientResult<SendMessageResponse> {
        let request = SendMessageRequest {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        };
        self.post_json(&api("/telegram/send"), &request).await
    }

    /// Newest first.
    pub async fn telegram_logs(
        &self,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ClientResult<Page<TelegramLog>> {
        self.get(&api("/telegram/logs"), &page_query(page, limit))
            .await
    }
}
