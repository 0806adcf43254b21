//! Local outbox for uploads whose object landed in storage but whose
//! content record was never created.
//!
//! Records live in a flat key to JSON map under keys of the form
//! `<kind>_upload_recovery_<unix-millis>`. [`RecoveryTool`] replays them
//! against the API and [`RecoveryDrainer`] does so on a fixed interval.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atrium_core::models::{ContentItem, ContentKind, CreateContentRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::{ApiClient, ClientError, ClientResult};

const KEY_MARKER: &str = "_upload_recovery_";

/// Phase-2 payload kept for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRecord {
    pub title: String,
    pub file_url: String,
    pub category_id: i64,
    pub upload_time: DateTime<Utc>,
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl RecoveryRecord {
    pub fn to_create_request(&self) -> CreateContentRequest {
        CreateContentRequest {
            title: self.title.clone(),
            file_url: self.file_url.clone(),
            cover_url: self.cover_url.clone(),
            category_id: self.category_id,
        }
    }
}

pub fn recovery_key(kind: ContentKind, millis: i64) -> String {
    format!("{}{}{}", kind.as_str(), KEY_MARKER, millis)
}

pub fn parse_recovery_key(key: &str) -> Option<(ContentKind, i64)> {
    let (kind, millis) = key.split_once(KEY_MARKER)?;
    let kind = ContentKind::ALL.into_iter().find(|k| k.as_str() == kind)?;
    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((kind, millis.parse().ok()?))
}

type Entries = BTreeMap<String, Value>;

/// First free key starting at the record's upload time, bumping the
/// timestamp on collision.
fn allocate_key(entries: &Entries, record: &RecoveryRecord) -> String {
    let mut millis = record.upload_time.timestamp_millis();
    loop {
        let key = recovery_key(record.kind, millis);
        if !entries.contains_key(&key) {
            return key;
        }
        millis += 1;
    }
}

/// Recovery entries in key order. Foreign keys and unreadable values are
/// skipped.
fn recovery_entries(entries: &Entries) -> Vec<(String, RecoveryRecord)> {
    entries
        .iter()
        .filter(|(key, _)| parse_recovery_key(key).is_some())
        .filter_map(|(key, value)| {
            match serde_json::from_value::<RecoveryRecord>(value.clone()) {
                Ok(record) => Some((key.clone(), record)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping unreadable recovery record");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
pub trait RecoveryStore: Send + Sync {
    /// Store `record` under a fresh key and return the key.
    async fn insert(&self, record: &RecoveryRecord) -> ClientResult<String>;

    async fn list(&self) -> ClientResult<Vec<(String, RecoveryRecord)>>;

    /// Returns `false` if the key was not present.
    async fn remove(&self, key: &str) -> ClientResult<bool>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryRecoveryStore {
    entries: Mutex<Entries>,
}

impl MemoryRecoveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON stored under `key`.
    pub async fn raw(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl RecoveryStore for MemoryRecoveryStore {
    async fn insert(&self, record: &RecoveryRecord) -> ClientResult<String> {
        let mut entries = self.entries.lock().await;
        let key = allocate_key(&entries, record);
        entries.insert(key.clone(), serde_json::to_value(record)?);
        Ok(key)
    }

    async fn list(&self) -> ClientResult<Vec<(String, RecoveryRecord)>> {
        Ok(recovery_entries(&*self.entries.lock().await))
    }

    async fn remove(&self, key: &str) -> ClientResult<bool> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }
}

/// JSON file store. Each write replaces the file through a temp file and a
/// rename. Writers in one process are serialised; other processes are not
/// coordinated.
#[derive(Debug)]
pub struct FileRecoveryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRecoveryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `ATRIUM_RECOVERY_FILE`, else `~/.atrium/recovery.json`, else
    /// `./.atrium-recovery.json`.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os("ATRIUM_RECOVERY_FILE") {
            return PathBuf::from(path);
        }
        match std::env::var_os("HOME") {
            Some(home) if !home.is_empty() => {
                PathBuf::from(home).join(".atrium").join("recovery.json")
            }
            _ => PathBuf::from(".atrium-recovery.json"),
        }
    }

    pub fn from_env() -> Self {
        Self::new(Self::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> ClientResult<Entries> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Entries::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ClientError::Recovery(format!(
                    "Recovery file {} is not a JSON object: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &Entries) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecoveryStore for FileRecoveryStore {
    async fn insert(&self, record: &RecoveryRecord) -> ClientResult<String> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        let key = allocate_key(&entries, record);
        entries.insert(key.clone(), serde_json::to_value(record)?);
        self.write_entries(&entries).await?;
        tracing::debug!(key = %key, path = %self.path.display(), "Recovery record written");
        Ok(key)
    }

    async fn list(&self) -> ClientResult<Vec<(String, RecoveryRecord)>> {
        let _guard = self.lock.lock().await;
        Ok(recovery_entries(&self.read_entries().await?))
    }

    async fn remove(&self, key: &str) -> ClientResult<bool> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.write_entries(&entries).await?;
        Ok(true)
    }
}

/// Outcome of one replay pass.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub recovered: Vec<(String, ContentItem)>,
    pub failed: Vec<(String, String)>,
}

impl ReplayReport {
    pub fn is_empty(&self) -> bool {
        self.recovered.is_empty() && self.failed.is_empty()
    }
}

/// Lists orphaned uploads and replays their phase 2.
#[derive(Clone)]
pub struct RecoveryTool {
    client: ApiClient,
    store: Arc<dyn RecoveryStore>,
    /// Records whose item was created but whose key could not be removed.
    /// Later replays of these keys only retry the removal.
    created: Arc<Mutex<HashMap<String, ContentItem>>>,
}

impl RecoveryTool {
    pub fn new(client: ApiClient, store: Arc<dyn RecoveryStore>) -> Self {
        Self {
            client,
            store,
            created: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn list(&self) -> ClientResult<Vec<(String, RecoveryRecord)>> {
        self.store.list().await
    }

    /// Replay a single record. The key is removed only on success. A record
    /// whose item was already created by this tool is not posted again.
    pub async fn replay(&self, key: &str, record: &RecoveryRecord) -> ClientResult<ContentItem> {
        let pending = self.created.lock().await.get(key).cloned();
        let item = match pending {
            Some(item) => item,
            None => {
                self.client
                    .create_content(record.kind, &record.to_create_request())
                    .await?
            }
        };

        if let Err(e) = self.store.remove(key).await {
            tracing::error!(
                key = %key,
                item_id = item.id,
                kind = %record.kind,
                error = %e,
                "Content item created but recovery record could not be removed"
            );
            self.created.lock().await.insert(key.to_string(), item.clone());
            return Err(ClientError::Recovery(format!(
                "item {} created but record {} was not removed: {}",
                item.id, key, e
            )));
        }

        self.created.lock().await.remove(key);
        tracing::info!(key = %key, item_id = item.id, kind = %record.kind, "Recovered orphaned upload");
        Ok(item)
    }

    pub async fn replay_all(&self) -> ClientResult<ReplayReport> {
        let mut report = ReplayReport::default();

        for (key, record) in self.store.list().await? {
            match self.replay(&key, &record).await {
                Ok(item) => report.recovered.push((key, item)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Recovery replay failed, keeping record");
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryDrainerConfig {
    pub poll_interval: Duration,
}

impl Default for RecoveryDrainerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Background task replaying the store on a fixed interval until shut down.
pub struct RecoveryDrainer {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl RecoveryDrainer {
    /// Reports of non-empty passes are sent to `reports` when given; a full
    /// channel drops the report.
    pub fn spawn(
        tool: RecoveryTool,
        config: RecoveryDrainerConfig,
        reports: Option<mpsc::Sender<ReplayReport>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(Self::worker_loop(tool, config, reports, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    async fn worker_loop(
        tool: RecoveryTool,
        config: RecoveryDrainerConfig,
        reports: Option<mpsc::Sender<ReplayReport>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let period = config.poll_interval.max(Duration::from_millis(10));
        let mut poll_interval = interval(period);

        tracing::info!(
            poll_interval_ms = period.as_millis() as u64,
            "Recovery drainer started"
        );

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    match tool.replay_all().await {
                        Ok(report) if report.is_empty() => {}
                        Ok(report) => {
                            tracing::info!(
                                recovered = report.recovered.len(),
                                failed = report.failed.len(),
                                "Recovery pass finished"
                            );
                            if let Some(tx) = &reports {
                                let _ = tx.try_send(report);
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Failed to read recovery store"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Recovery drainer shutting down");
                    break;
                }
            }
        }
    }

    /// Signal the worker and wait for the current pass to finish.
    pub async fn shutdown(self) {
        if let Err(e) = self.shutdown_tx.send(()).await {
            tracing::warn!(error = %e, "Failed to send shutdown signal to recovery drainer");
        }
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Recovery drainer task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(kind: ContentKind, millis: i64) -> RecoveryRecord {
        RecoveryRecord {
            title: "Lecture 1".to_string(),
            file_url: "https://x/y.mp3".to_string(),
            category_id: 3,
            upload_time: Utc.timestamp_millis_opt(millis).unwrap(),
            kind,
            cover_url: None,
        }
    }

    #[test]
    fn keys_round_trip_and_reject_foreign_names() {
        let key = recovery_key(ContentKind::Pdf, 1718000000000);
        assert_eq!(key, "pdf_upload_recovery_1718000000000");
        assert_eq!(
            parse_recovery_key(&key),
            Some((ContentKind::Pdf, 1718000000000))
        );
        assert_eq!(parse_recovery_key("theme"), None);
        assert_eq!(parse_recovery_key("pdfs_upload_recovery_1"), None);
        assert_eq!(parse_recovery_key("audio_upload_recovery_"), None);
        assert_eq!(parse_recovery_key("audio_upload_recovery_12a"), None);
    }

    #[test]
    fn record_serialises_camel_case() {
        let mut rec = record(ContentKind::Audio, 0);
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("fileUrl").is_some());
        assert!(json.get("categoryId").is_some());
        assert!(json.get("uploadTime").is_some());
        assert!(json.get("coverUrl").is_none());
        assert_eq!(json["kind"], "audio");

        rec.cover_url = Some("https://x/cover.png".to_string());
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["coverUrl"], "https://x/cover.png");
    }

    #[tokio::test]
    async fn same_millisecond_keys_are_bumped() {
        let store = MemoryRecoveryStore::new();
        let first = store.insert(&record(ContentKind::Audio, 1000)).await.unwrap();
        let second = store.insert(&record(ContentKind::Audio, 1000)).await.unwrap();
        let other_kind = store.insert(&record(ContentKind::Video, 1000)).await.unwrap();

        assert_eq!(first, "audio_upload_recovery_1000");
        assert_eq!(second, "audio_upload_recovery_1001");
        assert_eq!(other_kind, "video_upload_recovery_1000");
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("recovery.json");

        let key = {
            let store = FileRecoveryStore::new(&path);
            store.insert(&record(ContentKind::Pdf, 42)).await.unwrap()
        };

        let reopened = FileRecoveryStore::new(&path);
        let entries = reopened.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, key);
        assert_eq!(entries[0].1.file_url, "https://x/y.mp3");

        assert!(reopened.remove(&key).await.unwrap());
        assert!(!reopened.remove(&key).await.unwrap());
        assert!(reopened.list().await.unwrap().is_empty());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_skips_foreign_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recovery.json");
        let content = serde_json::json!({
            "theme": "dark",
            "audio_upload_recovery_5": {"title": "broken"},
            "audio_upload_recovery_6": serde_json::to_value(record(ContentKind::Audio, 6)).unwrap()
        });
        std::fs::write(&path, serde_json::to_vec(&content).unwrap()).unwrap();

        let store = FileRecoveryStore::new(&path);
        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "audio_upload_recovery_6");

        // unrelated keys survive a write
        store.insert(&record(ContentKind::Audio, 7)).await.unwrap();
        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
    }

    #[tokio::test]
    async fn missing_or_empty_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileRecoveryStore::new(dir.path().join("absent.json"));
        assert!(missing.list().await.unwrap().is_empty());

        let empty_path = dir.path().join("empty.json");
        std::fs::write(&empty_path, "").unwrap();
        assert!(FileRecoveryStore::new(&empty_path).list().await.unwrap().is_empty());

        let corrupt_path = dir.path().join("corrupt.json");
        std::fs::write(&corrupt_path, "[1,2]").unwrap();
        let err = FileRecoveryStore::new(&corrupt_path).list().await.unwrap_err();
        assert!(matches!(err, ClientError::Recovery(_)));
    }
}
