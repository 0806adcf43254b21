//! Two-phase upload: store the object, then register the content record.
//! A phase-2 failure leaves a [`RecoveryRecord`] behind for later replay.

use std::path::{Component, Path};
use std::sync::Arc;

use atrium_core::models::{ContentItem, ContentKind, CreateContentRequest};
use chrono::Utc;

use crate::recovery::{RecoveryRecord, RecoveryStore};
use crate::{ApiClient, ClientError, ClientResult};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub kind: ContentKind,
    pub title: String,
    pub category_id: i64,
    pub cover_url: Option<String>,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadRequest {
    pub async fn from_path(
        kind: ContentKind,
        path: &Path,
        title: impl Into<String>,
        category_id: i64,
    ) -> ClientResult<Self> {
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(ClientError::InvalidInput(format!(
                "Refusing path with parent components: {}",
                path.display()
            )));
        }
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::InvalidInput(format!("Not a file path: {}", path.display()))
            })?;

        Ok(Self {
            kind,
            title: title.into(),
            category_id,
            cover_url: None,
            content_type: guess_content_type(&filename).map(str::to_string),
            filename,
            data,
        })
    }

    pub fn with_cover(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = Some(cover_url.into());
        self
    }

    fn validate(&self) -> ClientResult<()> {
        if self.title.trim().is_empty() {
            return Err(ClientError::InvalidInput("Title is required".to_string()));
        }
        if self.cover_url.is_some() && self.kind != ContentKind::Pdf {
            return Err(ClientError::InvalidInput(format!(
                "{} items cannot have a cover image",
                self.kind.label()
            )));
        }
        if self.data.is_empty() {
            return Err(ClientError::InvalidInput("File is empty".to_string()));
        }
        Ok(())
    }
}

pub fn guess_content_type(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    Some(match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => return None,
    })
}

pub struct Uploader {
    client: ApiClient,
    store: Arc<dyn RecoveryStore>,
}

impl Uploader {
    pub fn new(client: ApiClient, store: Arc<dyn RecoveryStore>) -> Self {
        Self { client, store }
    }

    /// Upload the file, then create the item.
    ///
    /// A phase-1 failure returns its error and leaves nothing behind. A
    /// phase-2 failure writes a recovery record and returns
    /// [`ClientError::Orphaned`] carrying its key.
    #[tracing::instrument(skip(self, request), fields(kind = %request.kind, filename = %request.filename))]
    pub async fn upload(&self, request: UploadRequest) -> ClientResult<ContentItem> {
        request.validate()?;

        let UploadRequest {
            kind,
            title,
            category_id,
            cover_url,
            filename,
            content_type,
            data,
        } = request;

        let stored = self
            .client
            .upload_file(kind, &filename, content_type.as_deref(), data)
            .await?;
        tracing::debug!(file_url = %stored.file_url, "Object stored");

        let create = CreateContentRequest {
            title,
            file_url: stored.file_url,
            cover_url,
            category_id,
        };

        match self.client.create_content(kind, &create).await {
            Ok(item) => {
                tracing::info!(item_id = item.id, "Upload registered");
                Ok(item)
            }
            Err(source) => {
                let record = RecoveryRecord {
                    title: create.title,
                    file_url: create.file_url,
                    category_id: create.category_id,
                    upload_time: Utc::now(),
                    kind,
                    cover_url: create.cover_url,
                };

                let key = self.store.insert(&record).await.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        file_url = %record.file_url,
                        "Failed to persist recovery record"
                    );
                    ClientError::Recovery(format!(
                        "could not save recovery record for {}: {} (registration failed: {})",
                        record.file_url, e, source
                    ))
                })?;

                tracing::warn!(key = %key, error = %source, "Registration failed, recovery record saved");
                Err(ClientError::Orphaned {
                    key,
                    source: Box::new(source),
                })
            }
        }
    }
}
