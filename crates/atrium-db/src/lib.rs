//! Atrium Database Layer
//!
//! Postgres repositories for categories, content, users and their category
//! grants, the storefront, and the Telegram relay.

pub mod db;

pub use db::{
    CategoryRepository, ContentRepository, OrderRepository, ProductRepository,
    TelegramRepository, UserChanges, UserRepository,
};

pub use db::transaction::with_transaction;
