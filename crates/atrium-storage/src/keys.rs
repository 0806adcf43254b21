//! Shared key generation for storage backends.

use atrium_core::models::ContentKind;
use uuid::Uuid;

use crate::{StorageError, StorageResult};

/// Generate a fresh key `{kind}/{uuid}.{ext}`. The extension is taken from
/// `filename`, lowercased and restricted to ASCII alphanumerics.
pub fn generate_storage_key(kind: ContentKind, filename: &str) -> String {
    let id = Uuid::new_v4();
    match extension(filename) {
        Some(ext) => format!("{}/{}.{}", kind.as_str(), id, ext),
        None => format!("{}/{}", kind.as_str(), id),
    }
}

pub fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Reject keys that could escape the storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty()
        || storage_key.contains("..")
        || storage_key.starts_with('/')
        || storage_key.contains('\\')
        || storage_key.contains('\0')
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
