//! Atrium Core Library
//!
//! This crate provides the domain models, error types, configuration and the
//! shared client-independent logic (category grouping, media viewer fallback
//! chain, pagination) used by every Atrium component.

pub mod config;
pub mod error;
pub mod grouping;
pub mod models;
pub mod pagination;
pub mod storage_types;
pub mod viewer;

// Re-export commonly used types
pub use config::{AtriumConfig, BaseConfig, Config, MediaLimits};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use grouping::{group_by_category, load_groups};
pub use pagination::{ListPayload, Page, PageQuery, Pagination};
pub use storage_types::StorageBackend;
