//! Data models for the application
//!
//! Organized by domain: content and categories, users and their category
//! grants, the storefront, and the Telegram relay.

mod category;
mod content;
mod storefront;
mod telegram;
mod user;

pub use category::*;
pub use content::*;
pub use storefront::*;
pub use telegram::*;
pub use user::*;
