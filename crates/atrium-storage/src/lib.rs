//! Atrium Storage Library
//!
//! Object storage for uploaded content: the [`Storage`] trait plus local
//! filesystem and S3-compatible backends.
//!
//! # Storage key format
//!
//! Every backend lays objects out as `{kind}/{uuid}.{ext}`, e.g.
//! `audio/6f1c...e2.mp3`. Keys never contain `..` or a leading `/`; key
//! generation lives in the `keys` module so backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use atrium_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
