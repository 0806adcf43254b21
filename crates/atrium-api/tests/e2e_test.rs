//! End-to-end flows against a real Postgres (Docker required).

mod helpers;

use atrium_api::auth::password::hash_password;
use atrium_core::models::UserRole;
use helpers::setup_test_app;
use serde_json::{json, Value};

async fn create_category(app: &helpers::TestApp, name: &str) -> i64 {
    let response = app
        .client()
        .post("/api/categories")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({ "name": name }))
        .await;
    assert_eq!(response.status_code(), 201);
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn create_audio(app: &helpers::TestApp, title: &str, category_id: i64) -> i64 {
    let response = app
        .client()
        .post("/api/audio")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({
            "title": title,
            "file_url": format!("https://cdn.test/{}.mp3", title),
            "category_id": category_id,
        }))
        .await;
    assert_eq!(response.status_code(), 201);
    response.json::<Value>()["id"].as_i64().unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn login_issues_a_token_that_reaches_me() {
    let app = setup_test_app().await;
    let hash = hash_password("password123").unwrap();
    app.state
        .db
        .users
        .create("Reader@Example.com", Some("Reader"), UserRole::Member, &hash)
        .await
        .unwrap();

    let bad = app
        .client()
        .post("/api/auth/login")
        .json(&json!({ "email": "reader@example.com", "password": "wrong-pass" }))
        .await;
    assert_eq!(bad.status_code(), 401);

    let login = app
        .client()
        .post("/api/auth/login")
        .json(&json!({ "email": "reader@example.com", "password": "password123" }))
        .await;
    assert_eq!(login.status_code(), 200);
    let token = login.json::<Value>()["token"].as_str().unwrap().to_string();

    let me = app
        .client()
        .get("/api/me")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;
    assert_eq!(me.status_code(), 200);
    let body: Value = me.json();
    assert_eq!(body["role"], "member");
    assert_eq!(body["category_ids"], json!([]));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn members_only_see_granted_categories() {
    let app = setup_test_app().await;
    let lectures = create_category(&app, "Lectures").await;
    let music = create_category(&app, "Music").await;
    let lecture_item = create_audio(&app, "intro", lectures).await;
    let music_item = create_audio(&app, "theme", music).await;

    let user = app
        .client()
        .post("/api/users")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({
            "email": "member@example.com",
            "password": "password123",
            "category_ids": [lectures],
        }))
        .await;
    assert_eq!(user.status_code(), 201);
    let user_id = user.json::<Value>()["id"].as_i64().unwrap();
    let member = app.bearer_for(user_id, UserRole::Member);

    let list = app
        .client()
        .get("/api/audio")
        .add_header("Authorization", member.clone())
        .await;
    let body: Value = list.json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], lecture_item);

    let hidden = app
        .client()
        .get(&format!("/api/audio/{}", music_item))
        .add_header("Authorization", member.clone())
        .await;
    assert_eq!(hidden.status_code(), 404);

    let preview = app
        .client()
        .get(&format!("/api/preview/audio?categories={},{}", lectures, music))
        .add_header("Authorization", member.clone())
        .await;
    let groups: Value = preview.json();
    assert_eq!(groups.as_array().unwrap().len(), 1);
    assert_eq!(groups[0]["id"], lectures);

    let admin_preview = app
        .client()
        .get("/api/preview/audio")
        .add_header("Authorization", app.master_bearer())
        .await;
    assert_eq!(admin_preview.json::<Value>().as_array().unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn viewer_plan_follows_the_device() {
    let app = setup_test_app().await;
    let category = create_category(&app, "Docs").await;
    let pdf = app
        .client()
        .post("/api/pdfs")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({
            "title": "Handbook",
            "file_url": "https://cdn.test/handbook.pdf",
            "cover_url": "https://cdn.test/handbook.png",
            "category_id": category,
        }))
        .await;
    assert_eq!(pdf.status_code(), 201);
    let id = pdf.json::<Value>()["id"].as_i64().unwrap();

    let plan = app
        .client()
        .get(&format!("/api/viewer/pdfs/{}?errors=1&scale=9&rotation=-90", id))
        .add_header("Authorization", app.master_bearer())
        .add_header(
            "User-Agent",
            "Mozilla/5.0 (X11; Linux x86_64) Chrome/126.0 Safari/537.36",
        )
        .await;
    assert_eq!(plan.status_code(), 200);
    let body: Value = plan.json();
    assert_eq!(body["initial"], "primary");
    assert_eq!(body["current"], "secondary");
    assert_eq!(body["transform"]["scale"], 3.0);
    assert_eq!(body["transform"]["rotation"], 270);

    let cover_on_audio = app
        .client()
        .post("/api/audio")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({
            "title": "x",
            "file_url": "https://cdn.test/x.mp3",
            "cover_url": "https://cdn.test/x.png",
            "category_id": category,
        }))
        .await;
    assert_eq!(cover_on_audio.status_code(), 400);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn orders_respect_stock() {
    let app = setup_test_app().await;
    let product = app
        .client()
        .post("/api/storefront/products")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({ "name": "Poster", "price": 12.5, "stock": 2 }))
        .await;
    assert_eq!(product.status_code(), 201);
    let product_id = product.json::<Value>()["id"].as_i64().unwrap();

    let hash = hash_password("password123").unwrap();
    let buyer = app
        .state
        .db
        .users
        .create("buyer@example.com", None, UserRole::Member, &hash)
        .await
        .unwrap();
    let bearer = app.bearer_for(buyer.id, UserRole::Member);

    let order = app
        .client()
        .post("/api/storefront/orders")
        .add_header("Authorization", bearer.clone())
        .json(&json!({ "product_id": product_id, "quantity": 2 }))
        .await;
    assert_eq!(order.status_code(), 201);
    assert_eq!(order.json::<Value>()["total"], 25.0);

    let sold_out = app
        .client()
        .post("/api/storefront/orders")
        .add_header("Authorization", bearer.clone())
        .json(&json!({ "product_id": product_id, "quantity": 1 }))
        .await;
    assert_eq!(sold_out.status_code(), 409);
    assert_eq!(sold_out.json::<Value>()["code"], "INSUFFICIENT_STOCK");

    let mine = app
        .client()
        .get("/api/storefront/orders/mine")
        .add_header("Authorization", bearer)
        .await;
    assert_eq!(mine.json::<Value>()["total"], 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn webhook_logs_inbound_and_skips_unconfigured_forward() {
    let app = setup_test_app().await;

    let settings = app
        .client()
        .put("/api/telegram/settings")
        .add_header("Authorization", app.master_bearer())
        .json(&json!({ "forwarding_keywords": ["urgent"] }))
        .await;
    assert_eq!(settings.status_code(), 200);

    let update = json!({
        "update_id": 10,
        "message": {
            "message_id": 5,
            "chat": { "id": 1001 },
            "text": "This is URGENT"
        }
    });
    let response = app
        .client()
        .post("/api/telegram/webhook")
        .add_header("X-Telegram-Bot-Api-Secret-Token", helpers::TEST_WEBHOOK_SECRET)
        .json(&update)
        .await;
    assert_eq!(response.status_code(), 200);

    let logs = app
        .client()
        .get("/api/telegram/logs")
        .add_header("Authorization", app.master_bearer())
        .await;
    let body: Value = logs.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["direction"], "forwarded");
    assert_eq!(body["items"][0]["status"], "skipped");
    assert_eq!(body["items"][1]["direction"], "inbound");
    assert_eq!(body["items"][1]["matched_keyword"], "urgent");
}
