//! Conflict resolution for links that share a URL
//!
//! Used by import: an imported link whose URL already exists is folded into
//! the existing record instead of being rejected as a duplicate.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::models::Link;

/// Errors from merging
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("Cannot merge links with different URLs: '{left}' and '{right}'")]
    IncompatibleMerge { left: String, right: String },
}

/// Result type alias for merging
pub type MergeResult<T> = Result<T, MergeError>;

/// Merge two records for the same URL
///
/// Scalar fields prefer `a` when it has a value, so the operation is not
/// symmetric. Tags are the sorted union of both sides, counters and
/// timestamps take the larger value.
pub fn merge_links(a: &Link, b: &Link) -> MergeResult<Link> {
    if a.url != b.url {
        return Err(MergeError::IncompatibleMerge {
            left: a.url.clone(),
            right: b.url.clone(),
        });
    }

    let tags: BTreeSet<&String> = a.tags.iter().chain(&b.tags).collect();

    Ok(Link {
        title: prefer_non_empty(&a.title, &b.title),
        tags: tags.into_iter().cloned().collect(),
        url: a.url.clone(),
        date_time: a.date_time.max(b.date_time),
        rating: a.rating.or(b.rating),
        thumbnail_url: prefer_non_empty(&a.thumbnail_url, &b.thumbnail_url),
        open_counter: a.open_counter.max(b.open_counter),
    })
}

fn prefer_non_empty(first: &Option<String>, second: &Option<String>) -> Option<String> {
    match first.as_deref() {
        Some(value) if !value.is_empty() => first.clone(),
        _ => second.clone(),
    }
}
