//! Router behaviour that does not need a live database.

mod helpers;

use atrium_core::models::UserRole;
use axum_test::multipart::{MultipartForm, Part};
use helpers::{setup_offline_app, TEST_WEBHOOK_SECRET};
use serde_json::{json, Value};

#[tokio::test]
async fn liveness_check_is_public() {
    let app = setup_offline_app().await;

    let response = app.client().get("/live").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let app = setup_offline_app().await;

    let response = app
        .client()
        .get("/live")
        .add_header("X-Request-ID", "req-123")
        .await;
    assert_eq!(response.header("x-request-id"), "req-123");

    let response = app.client().get("/live").await;
    assert!(!response.header("x-request-id").is_empty());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_offline_app().await;

    let response = app.client().get("/api/openapi.json").await;

    assert_eq!(response.status_code(), 200);
    let doc: Value = response.json();
    assert!(doc["paths"]["/api/storefront/orders"].is_object());
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = setup_offline_app().await;

    let response = app.client().get("/api/categories").await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["recoverable"], false);
}

#[tokio::test]
async fn garbage_tokens_are_rejected() {
    let app = setup_offline_app().await;

    let response = app
        .client()
        .get("/api/me")
        .add_header("Authorization", "Bearer not-a-jwt")
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn master_key_acts_as_unrestricted_admin() {
    let app = setup_offline_app().await;

    let response = app
        .client()
        .get("/api/me")
        .add_header("Authorization", app.master_bearer())
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["role"], "admin");
    assert!(body.get("user").is_none());
    assert!(body.get("category_ids").is_none());
}

#[tokio::test]
async fn members_cannot_reach_admin_routes() {
    let app = setup_offline_app().await;

    let response = app
        .client()
        .post("/api/categories")
        .add_header("Authorization", app.bearer_for(42, UserRole::Member))
        .json(&json!({ "name": "Lectures" }))
        .await;

    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn invalid_bodies_fail_before_the_database() {
    let app = setup_offline_app().await;

    let response = app
        .client()
        .post("/api/categories")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({ "name": "" }))
        .await;

    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .post("/api/storefront/products")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({ "name": "Poster", "price": -3.5 }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn whitespace_titles_are_rejected() {
    let app = setup_offline_app().await;

    let response = app
        .client()
        .post("/api/audio")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({
            "title": "   ",
            "file_url": "https://cdn.example.com/a.mp3",
            "category_id": 1
        }))
        .await;

    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .put("/api/audio/1")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({ "title": "\t " }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn unknown_content_kind_is_not_found() {
    let app = setup_offline_app().await;

    let response = app
        .client()
        .get("/api/images")
        .add_header("Authorization", app.master_bearer())
        .await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn master_key_cannot_place_orders() {
    let app = setup_offline_app().await;

    let response = app
        .client()
        .post("/api/storefront/orders")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({ "product_id": 1, "quantity": 1 }))
        .await;

    assert_eq!(response.status_code(), 400);
}

fn audio_form(filename: &str, content_type: &str, bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_text("kind", "audio").add_part(
        "file",
        Part::bytes(bytes)
            .file_name(filename)
            .mime_type(content_type),
    )
}

#[tokio::test]
async fn upload_stores_file_and_media_route_serves_it() {
    let app = setup_offline_app().await;
    let bytes = b"ID3 fake mp3 payload".to_vec();

    let response = app
        .client()
        .post("/api/storage/upload")
        .add_header("Authorization", app.master_bearer())
        .multipart(audio_form("track.mp3", "audio/mpeg", bytes.clone()))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    let key = body["storage_key"].as_str().unwrap().to_string();
    assert!(key.starts_with("audio/"));
    assert!(key.ends_with(".mp3"));
    assert_eq!(
        body["file_url"].as_str().unwrap(),
        format!("{}/{}", helpers::MEDIA_BASE_URL, key)
    );
    assert_eq!(body["size"], bytes.len() as i64);

    let media = app.client().get(&format!("/media/{}", key)).await;
    assert_eq!(media.status_code(), 200);
    assert_eq!(media.header("content-type"), "audio/mpeg");
    assert_eq!(media.as_bytes().to_vec(), bytes);
}

#[tokio::test]
async fn upload_enforces_kind_limits() {
    let app = setup_offline_app().await;

    let too_big = app
        .client()
        .post("/api/storage/upload")
        .add_header("Authorization", app.master_bearer())
        .multipart(audio_form("big.mp3", "audio/mpeg", vec![0u8; 4096]))
        .await;
    assert_eq!(too_big.status_code(), 413);

    let wrong_ext = app
        .client()
        .post("/api/storage/upload")
        .add_header("Authorization", app.master_bearer())
        .multipart(audio_form("track.exe", "audio/mpeg", vec![1u8; 16]))
        .await;
    assert_eq!(wrong_ext.status_code(), 400);

    let member = app
        .client()
        .post("/api/storage/upload")
        .add_header("Authorization", app.bearer_for(7, UserRole::Member))
        .multipart(audio_form("track.mp3", "audio/mpeg", vec![1u8; 16]))
        .await;
    assert_eq!(member.status_code(), 403);
}

#[tokio::test]
async fn media_route_returns_404_for_missing_keys() {
    let app = setup_offline_app().await;

    let missing = app.client().get("/media/audio/nope.mp3").await;
    assert_eq!(missing.status_code(), 404);
}

#[tokio::test]
async fn webhook_checks_the_secret_token() {
    let app = setup_offline_app().await;
    let update = json!({ "update_id": 1 });

    let response = app
        .client()
        .post("/api/telegram/webhook")
        .json(&update)
        .await;
    assert_eq!(response.status_code(), 401);

    let response = app
        .client()
        .post("/api/telegram/webhook")
        .add_header("X-Telegram-Bot-Api-Secret-Token", TEST_WEBHOOK_SECRET)
        .json(&update)
        .await;
    assert_eq!(response.status_code(), 200);
}
