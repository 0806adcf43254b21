use std::sync::Arc;

use atrium_core::Config;

#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};

fn required<'a>(value: Option<&'a str>, name: &str) -> StorageResult<&'a str> {
    value.ok_or_else(|| StorageError::ConfigError(format!("{} not configured", name)))
}

#[cfg(feature = "storage-s3")]
async fn s3_backend(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let bucket = required(config.s3_bucket(), "S3_BUCKET")?;
    let region = required(
        config.s3_region().or_else(|| config.aws_region()),
        "S3_REGION or AWS_REGION",
    )?;

    let storage = S3Storage::new(
        bucket.to_string(),
        region.to_string(),
        config.s3_endpoint().map(String::from),
    )
    .await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "storage-s3"))]
async fn s3_backend(_config: &Config) -> StorageResult<Arc<dyn Storage>> {
    Err(StorageError::ConfigError(
        "S3 backend requires the storage-s3 feature".to_string(),
    ))
}

#[cfg(feature = "storage-local")]
async fn local_backend(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let base_path = config.local_storage_path().ok_or_else(|| {
        StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
    })?;
    let base_url = required(config.local_storage_base_url(), "LOCAL_STORAGE_BASE_URL")?;

    let storage = LocalStorage::new(base_path, base_url.to_string()).await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "storage-local"))]
async fn local_backend(_config: &Config) -> StorageResult<Arc<dyn Storage>> {
    Err(StorageError::ConfigError(
        "Local backend requires the storage-local feature".to_string(),
    ))
}

/// Build the backend named by `STORAGE_BACKEND`, local when unset.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend().unwrap_or(StorageBackend::Local);
    tracing::debug!(%backend, "Creating media storage");

    match backend {
        StorageBackend::S3 => s3_backend(config).await,
        StorageBackend::Local => local_backend(config).await,
    }
}
