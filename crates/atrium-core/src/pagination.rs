//! Page-based pagination shared by every list endpoint.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Raw `page` / `limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct PageQuery {
    /// 1-based page number (default 1)
    #[serde(default)]
    pub page: Option<i64>,
    /// Page size (default 20, clamped to 1..=100)
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

/// Normalised pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Envelope returned by every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        }
    }

    pub fn total_pages(&self) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        (self.total + self.limit - 1) / self.limit
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Accepts both the `{items, total, ...}` envelope and a bare JSON array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Paged { items: Vec<T>, total: i64 },
    Bare(Vec<T>),
}

impl<T> ListPayload<T> {
    pub fn total(&self) -> i64 {
        match self {
            ListPayload::Paged { total, .. } => *total,
            ListPayload::Bare(items) => items.len() as i64,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            ListPayload::Paged { items, .. } => items,
            ListPayload::Bare(items) => items,
        }
    }
}
