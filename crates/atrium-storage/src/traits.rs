//! Storage abstraction trait

use std::pin::Pin;

use async_trait::async_trait;
use atrium_core::models::ContentKind;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

use crate::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Backend-independent object storage.
///
/// Content is written once by the upload endpoint and read back either
/// through its public URL or, for the local backend, through the API's
/// media route.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under a fresh key for `kind` and return `(storage_key, public_url)`.
    ///
    /// `filename` is only used for its extension.
    async fn upload(
        &self,
        kind: ContentKind,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<(String, String)>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download a file as a stream of chunks
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Delete a file. Deleting a missing key succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Public URL for a key
    fn public_url(&self, storage_key: &str) -> String;

    fn backend_type(&self) -> StorageBackend;
}
