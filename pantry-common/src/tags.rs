//! Tag normalization
//!
//! Turns the free-text answer of a vision model ("bread, milk , eggs") into
//! the bounded tag list stored on a pantry item. Never fails: malformed or
//! empty input degrades to an empty list.

/// Maximum number of tags kept on an item
pub const MAX_TAGS: usize = 5;

/// Parse raw model output into an ordered tag list
///
/// Splits on commas, trims each segment, drops empty segments and exact
/// duplicates (first occurrence wins), then truncates to [`MAX_TAGS`].
///
/// ```
/// use pantry_common::normalize;
///
/// assert_eq!(normalize("apple, banana ,  carrot"), vec!["apple", "banana", "carrot"]);
/// assert!(normalize("").is_empty());
/// ```
pub fn normalize(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}

/// Apply the normalization rules to an already split tag sequence
///
/// Used for caller-supplied tags on create/update so stored items obey the
/// same invariants as classified ones.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::with_capacity(MAX_TAGS);

    for tag in tags {
        if out.len() == MAX_TAGS {
            break;
        }

        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() || out.iter().any(|t| t == trimmed) {
            continue;
        }

        out.push(trimmed.to_string());
    }

    out
}
