//! Upload, recovery, preview and download against a stub API server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atrium_client::recovery::{RecoveryDrainerConfig, RecoveryRecord};
use atrium_client::{
    download_or_open, ApiClient, ClientError, DownloadOutcome, MemoryRecoveryStore,
    ClientResult, RecoveryDrainer, RecoveryStore, RecoveryTool, UploadRequest, Uploader,
};
use atrium_core::models::ContentKind;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use regex::Regex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

#[derive(Default)]
struct Stub {
    registration_ok: AtomicBool,
    registrations: AtomicUsize,
    last_registration: tokio::sync::Mutex<Option<Value>>,
}

async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn stored(_body: Bytes) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(json!({
            "file_url": "https://x/y.mp3",
            "storage_key": "audio/y.mp3",
            "content_type": "audio/mpeg",
            "size": 3
        })),
    )
}

async fn register(State(stub): State<Arc<Stub>>, Json(body): Json<Value>) -> impl IntoResponse {
    stub.registrations.fetch_add(1, Ordering::SeqCst);
    *stub.last_registration.lock().await = Some(body.clone());

    if !stub.registration_ok.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "database unavailable", "code": "DATABASE_ERROR", "recoverable": true})),
        );
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "id": 77,
            "kind": "audio",
            "title": body["title"],
            "file_url": body["file_url"],
            "category_id": body["category_id"],
            "created_at": "2024-06-10T06:13:20Z"
        })),
    )
}

async fn spawn_content_api(stub: Arc<Stub>) -> ApiClient {
    let router = Router::new()
        .route("/api/storage/upload", post(stored))
        .route("/api/audio", post(register))
        .with_state(stub);
    let base = spawn_server(router).await;
    ApiClient::new(base, Some("test-token".to_string())).unwrap()
}

fn audio_request() -> UploadRequest {
    UploadRequest {
        kind: ContentKind::Audio,
        title: "Sermon".to_string(),
        category_id: 2,
        cover_url: None,
        filename: "y.mp3".to_string(),
        content_type: Some("audio/mpeg".to_string()),
        data: b"ID3".to_vec(),
    }
}

#[tokio::test]
async fn failed_registration_leaves_recovery_record() {
    let stub = Arc::new(Stub::default());
    let client = spawn_content_api(stub.clone()).await;
    let store = Arc::new(MemoryRecoveryStore::new());
    let uploader = Uploader::new(client, store.clone());

    let err = uploader.upload(audio_request()).await.unwrap_err();
    let ClientError::Orphaned { key, source } = err else {
        panic!("expected an orphaned upload");
    };
    assert_eq!(source.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));

    let pattern = Regex::new(r"^audio_upload_recovery_\d+$").unwrap();
    assert!(pattern.is_match(&key), "unexpected key {}", key);

    let raw = store.raw(&key).await.expect("record stored under key");
    assert_eq!(raw["title"], "Sermon");
    assert_eq!(raw["fileUrl"], "https://x/y.mp3");
    assert_eq!(raw["categoryId"], 2);
    assert!(raw["uploadTime"].is_string());
    assert_eq!(store.keys().await, vec![key]);
}

#[tokio::test]
async fn successful_upload_writes_no_record() {
    let stub = Arc::new(Stub::default());
    stub.registration_ok.store(true, Ordering::SeqCst);
    let client = spawn_content_api(stub.clone()).await;
    let store = Arc::new(MemoryRecoveryStore::new());

    let item = Uploader::new(client, store.clone())
        .upload(audio_request())
        .await
        .unwrap();

    assert_eq!(item.id, 77);
    assert_eq!(item.file_url, "https://x/y.mp3");
    assert!(store.keys().await.is_empty());

    let sent = stub.last_registration.lock().await.clone().unwrap();
    assert_eq!(sent["category_id"], 2);
    assert!(sent.get("cover_url").is_none());
}

#[tokio::test]
async fn replay_keeps_failures_and_removes_successes() {
    let stub = Arc::new(Stub::default());
    let client = spawn_content_api(stub.clone()).await;
    let store = Arc::new(MemoryRecoveryStore::new());
    let uploader = Uploader::new(client.clone(), store.clone());
    assert!(uploader.upload(audio_request()).await.is_err());

    let tool = RecoveryTool::new(client, store.clone());
    assert_eq!(tool.list().await.unwrap().len(), 1);

    let report = tool.replay_all().await.unwrap();
    assert!(report.recovered.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(store.list().await.unwrap().len(), 1);

    stub.registration_ok.store(true, Ordering::SeqCst);
    let report = tool.replay_all().await.unwrap();
    assert_eq!(report.recovered.len(), 1);
    assert_eq!(report.recovered[0].1.id, 77);
    assert!(store.list().await.unwrap().is_empty());
}

/// Memory store whose removals fail while `locked` is set.
#[derive(Default)]
struct LockedStore {
    inner: MemoryRecoveryStore,
    locked: AtomicBool,
}

#[async_trait]
impl RecoveryStore for LockedStore {
    async fn insert(&self, record: &RecoveryRecord) -> ClientResult<String> {
        self.inner.insert(record).await
    }

    async fn list(&self) -> ClientResult<Vec<(String, RecoveryRecord)>> {
        self.inner.list().await
    }

    async fn remove(&self, key: &str) -> ClientResult<bool> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(ClientError::Recovery("store is read-only".to_string()));
        }
        self.inner.remove(key).await
    }
}

#[tokio::test]
async fn replay_does_not_duplicate_when_removal_fails() {
    let stub = Arc::new(Stub::default());
    let client = spawn_content_api(stub.clone()).await;
    let store = Arc::new(LockedStore::default());
    assert!(Uploader::new(client.clone(), store.clone())
        .upload(audio_request())
        .await
        .is_err());
    assert_eq!(stub.registrations.load(Ordering::SeqCst), 1);

    stub.registration_ok.store(true, Ordering::SeqCst);
    store.locked.store(true, Ordering::SeqCst);
    let tool = RecoveryTool::new(client, store.clone());

    let report = tool.replay_all().await.unwrap();
    assert!(report.recovered.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].1.contains("item 77 created"));
    assert_eq!(stub.registrations.load(Ordering::SeqCst), 2);
    assert_eq!(store.list().await.unwrap().len(), 1);

    // still locked: no second registration
    let report = tool.replay_all().await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(stub.registrations.load(Ordering::SeqCst), 2);

    store.locked.store(false, Ordering::SeqCst);
    let report = tool.replay_all().await.unwrap();
    assert_eq!(report.recovered.len(), 1);
    assert_eq!(report.recovered[0].1.id, 77);
    assert_eq!(stub.registrations.load(Ordering::SeqCst), 2);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn drainer_replays_until_shut_down() {
    let stub = Arc::new(Stub::default());
    let client = spawn_content_api(stub.clone()).await;
    let store = Arc::new(MemoryRecoveryStore::new());
    assert!(Uploader::new(client.clone(), store.clone())
        .upload(audio_request())
        .await
        .is_err());
    stub.registration_ok.store(true, Ordering::SeqCst);

    let (tx, mut rx) = mpsc::channel(4);
    let drainer = RecoveryDrainer::spawn(
        RecoveryTool::new(client, store.clone()),
        RecoveryDrainerConfig {
            poll_interval: Duration::from_millis(20),
        },
        Some(tx),
    );

    let report = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("drainer reported in time")
        .expect("report channel open");
    assert_eq!(report.recovered.len(), 1);
    assert!(store.list().await.unwrap().is_empty());

    drainer.shutdown().await;
}

fn category(id: i64, name: &str) -> Value {
    json!({"id": id, "name": name})
}

#[tokio::test]
async fn client_preview_applies_filter() {
    let router = Router::new()
        .route(
            "/api/categories",
            get(|| async {
                Json(json!({
                    "items": [category(1, "A"), category(2, "B")],
                    "total": 2, "page": 1, "limit": 100
                }))
            }),
        )
        .route(
            "/api/audio",
            // bare array, as older servers answered
            get(|| async {
                Json(json!([{
                    "id": 5, "kind": "audio", "title": "t", "file_url": "https://x/5.mp3",
                    "category_id": 2, "created_at": "2024-06-10T06:13:20Z"
                }]))
            }),
        );
    let client = ApiClient::new(spawn_server(router).await, None).unwrap();

    assert!(client.preview(ContentKind::Audio, Some(&[1])).await.is_empty());

    let groups = client.preview(ContentKind::Audio, None).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].category.id, 2);
    assert_eq!(groups[0].items[0].id, 5);
}

#[tokio::test]
async fn client_preview_fails_closed() {
    let router = Router::new()
        .route(
            "/api/categories",
            get(|| async { Json(json!([category(1, "A")])) }),
        )
        .route(
            "/api/pdfs",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
    let client = ApiClient::new(spawn_server(router).await, None).unwrap();

    assert!(client.preview(ContentKind::Pdf, None).await.is_empty());
}

#[tokio::test]
async fn download_saves_or_falls_back() {
    let router = Router::new()
        .route("/media/pdf/a.pdf", get(|| async { "%PDF-1.7" }))
        .route(
            "/media/pdf/missing.pdf",
            get(|| async { StatusCode::NOT_FOUND }),
        );
    let base = spawn_server(router).await;
    let client = ApiClient::new(base.clone(), None).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let url = format!("{}/media/pdf/a.pdf", base);
    let outcome = download_or_open(&client, &url, dir.path()).await;
    let path = dir.path().join("a.pdf");
    assert_eq!(
        outcome,
        DownloadOutcome::Saved {
            path: path.clone(),
            bytes: 8
        }
    );
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");

    let missing = format!("{}/media/pdf/missing.pdf", base);
    let outcome = download_or_open(&client, &missing, dir.path()).await;
    assert_eq!(outcome, DownloadOutcome::OpenExternally(missing));
    assert!(!dir.path().join("missing.pdf").exists());
}
