//! Client-side category preview.
//!
//! Fetches the item list and the categories concurrently and groups them
//! with the same routine the API uses. Any fetch failure yields no groups.

use atrium_core::load_groups;
use atrium_core::models::{CategoryGroup, ContentKind};

use crate::ApiClient;

impl ApiClient {
    pub async fn preview(&self, kind: ContentKind, filter: Option<&[i64]>) -> Vec<CategoryGroup> {
        load_groups(self.all_content(kind), self.all_categories(), filter).await
    }
}
