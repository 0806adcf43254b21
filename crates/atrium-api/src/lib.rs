//! Atrium API Library
//!
//! HTTP handlers, authentication, middleware and application setup for the
//! Atrium admin backend.

mod api_doc;
pub mod constants;
mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
mod telemetry;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError, ValidatedJson};
pub use state::AppState;
