//! Category-scoped grouping of content.
//!
//! Both the API preview endpoint and the client preview call reduce a flat
//! content list to per-category groups through [`group_by_category`], so the
//! access filter is applied in exactly one place.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use crate::models::{Category, CategoryGroup, ContentItem};

/// Group `items` under `categories`.
///
/// * `filter == None` keeps every category as a candidate; otherwise only
///   categories whose id is in `filter` are kept.
/// * Categories without items are dropped.
/// * Category order follows `categories`; items within a group are sorted by
///   ascending id.
pub fn group_by_category(
    items: Vec<ContentItem>,
    categories: &[Category],
    filter: Option<&[i64]>,
) -> Vec<CategoryGroup> {
    let allowed: Option<HashSet<i64>> = filter.map(|ids| ids.iter().copied().collect());

    let mut by_category: HashMap<i64, Vec<ContentItem>> = HashMap::new();
    for item in items {
        by_category.entry(item.category_id).or_default().push(item);
    }

    categories
        .iter()
        .filter(|c| allowed.as_ref().map_or(true, |set| set.contains(&c.id)))
        .filter_map(|category| {
            let mut items = by_category.remove(&category.id)?;
            if items.is_empty() {
                return None;
            }
            items.sort_by_key(|item| item.id);
            Some(CategoryGroup {
                category: category.clone(),
                items,
            })
        })
        .collect()
}

/// Fetch items and categories concurrently, then group them.
///
/// Fails closed: if either fetch errors the result is empty. There is no
/// partial output and no retry.
pub async fn load_groups<FI, FC, E>(
    fetch_items: FI,
    fetch_categories: FC,
    filter: Option<&[i64]>,
) -> Vec<CategoryGroup>
where
    FI: Future<Output = Result<Vec<ContentItem>, E>>,
    FC: Future<Output = Result<Vec<Category>, E>>,
    E: std::fmt::Display,
{
    match futures::try_join!(fetch_items, fetch_categories) {
        Ok((items, categories)) => group_by_category(items, &categories, filter),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load preview data, returning no groups");
            Vec::new()
        }
    }
}
