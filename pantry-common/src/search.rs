//! Item search filtering
//!
//! Case-insensitive substring match on item name and tags. An empty or
//! blank query matches everything.

use crate::models::PantryItem;

/// True if `item` matches `query`
pub fn matches(item: &PantryItem, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    item.name.to_lowercase().contains(&needle)
        || item.tags.iter().any(|t| t.to_lowercase().contains(&needle))
}

/// Keep the items matching `query`, preserving order
pub fn filter_items(items: Vec<PantryItem>, query: Option<&str>) -> Vec<PantryItem> {
    match query {
        Some(q) if !q.trim().is_empty() => items.into_iter().filter(|i| matches(i, q)).collect(),
        _ => items,
    }
}
