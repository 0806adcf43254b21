pub mod access;
pub mod auth;
pub mod categories;
pub mod content;
pub mod health;
pub mod preview;
pub mod storage;
pub mod storefront;
pub mod telegram;
pub mod users;
pub mod viewer;
