//! Category-grant checks shared by content, preview and viewer handlers.

use std::str::FromStr;

use atrium_core::models::{ContentItem, ContentKind};
use atrium_core::AppError;

use crate::auth::AuthContext;
use crate::error::HttpAppError;
use crate::state::DbState;

/// Parse a `{kind}` path segment (`audio`, `pdfs`, `videos`; singular accepted).
pub fn parse_kind(raw: &str) -> Result<ContentKind, HttpAppError> {
    ContentKind::from_str(raw)
        .map_err(|_| AppError::NotFound(format!("Unknown content kind '{}'", raw)).into())
}

/// Parse a comma separated id list such as `1,2,3`.
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>, HttpAppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::InvalidInput(format!("Invalid category id '{}'", s)).into())
        })
        .collect()
}

/// Intersect the caller's grants with an explicitly requested set.
///
/// `grants == None` means unrestricted; `requested == None` means "everything
/// the caller may see".
pub fn effective_filter(grants: Option<Vec<i64>>, requested: Option<Vec<i64>>) -> Option<Vec<i64>> {
    match (grants, requested) {
        (None, requested) => requested,
        (Some(grants), None) => Some(grants),
        (Some(grants), Some(requested)) => Some(
            requested
                .into_iter()
                .filter(|id| grants.contains(id))
                .collect(),
        ),
    }
}

/// Fail with 404 unless the caller may see `category_id`.
///
/// Hidden categories look missing rather than forbidden.
pub async fn ensure_category_visible(
    ctx: &AuthContext,
    db: &DbState,
    category_id: i64,
) -> Result<(), HttpAppError> {
    match ctx.category_filter(db).await? {
        Some(grants) if !grants.contains(&category_id) => {
            Err(AppError::NotFound("Category not found".to_string()).into())
        }
        _ => Ok(()),
    }
}

/// Load an item of `kind` the caller is allowed to see.
pub async fn load_visible_item(
    ctx: &AuthContext,
    db: &DbState,
    kind: ContentKind,
    id: i64,
) -> Result<ContentItem, HttpAppError> {
    let not_found = || AppError::NotFound(format!("{} not found", kind.label()));

    let item = db.content.get(kind, id).await?.ok_or_else(not_found)?;
    if let Some(grants) = ctx.category_filter(db).await? {
        if !grants.contains(&item.category_id) {
            return Err(not_found().into());
        }
    }
    Ok(item)
}
