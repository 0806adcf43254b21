//! Database repositories for the data access layer
//!
//! Each repository owns a clone of the pool and exposes CRUD operations plus
//! the specialised queries its handlers need.

pub mod category;
pub mod content;
pub mod storefront;
pub mod telegram;
pub mod transaction;
pub mod user;

pub use category::CategoryRepository;
pub use content::ContentRepository;
pub use storefront::{OrderRepository, ProductRepository};
pub use telegram::TelegramRepository;
pub use user::{UserChanges, UserRepository};
