//! Clipboard history entry as seen by the client
//!
//! The backend owns identity and order; everything here only reflects it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable backend-assigned identity of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of content an entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ContentKind {
    #[default]
    Text,
    Html,
    Rtf,
    Image,
    Files,
}

impl ContentKind {
    /// Map a MIME type reported by the backend to a content kind
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            m if m.starts_with("image/") => ContentKind::Image,
            "text/html" => ContentKind::Html,
            "text/rtf" | "application/rtf" => ContentKind::Rtf,
            "text/uri-list" | "x-special/gnome-copied-files" => ContentKind::Files,
            _ => ContentKind::Text,
        }
    }

    /// Short label used in the list gutter
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Text => "txt",
            ContentKind::Html => "htm",
            ContentKind::Rtf => "rtf",
            ContentKind::Image => "img",
            ContentKind::Files => "fil",
        }
    }
}

/// One clipboard history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ContentKind,
    pub mime_type: String,
    /// Short textual preview (may span several lines)
    pub preview: String,
    pub is_pinned: bool,
    pub is_favorite: bool,
    /// Server-assigned ordering key, only meaningful within a partition
    pub sort_order: i64,
    /// Unix seconds
    pub created_at: i64,
    /// Groups (cclip tags) this entry belongs to
    pub groups: Vec<String>,
}

impl Item {
    /// Number of preview lines, never less than one
    pub fn preview_line_count(&self) -> usize {
        self.preview.lines().count().max(1)
    }
}

/// Filter and paging options for a fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub search: Option<String>,
    pub group: Option<String>,
    pub favorite_only: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Number of leading pinned items.
///
/// Computed by a single scan every time it is needed; callers must not cache
/// it across mutations of the list.
pub fn pinned_count(items: &[Item]) -> usize {
    items.iter().take_while(|item| item.is_pinned).count()
}

/// Whether every pinned item precedes every unpinned one
#[cfg(test)]
pub fn is_partitioned(items: &[Item]) -> bool {
    let pinned = pinned_count(items);
    items[pinned..].iter().all(|item| !item.is_pinned)
}

#[cfg(test)]
pub(crate) fn test_item(id: u64, pinned: bool) -> Item {
    Item {
        id: ItemId(id),
        kind: ContentKind::Text,
        mime_type: "text/plain".to_string(),
        preview: format!("entry {}", id),
        is_pinned: pinned,
        is_favorite: false,
        sort_order: id as i64,
        created_at: 1_700_000_000 + id as i64,
        groups: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_count_counts_leading_run() {
        let items = vec![test_item(1, true), test_item(2, true), test_item(3, false)];
        assert_eq!(pinned_count(&items), 2);
        assert_eq!(pinned_count(&[]), 0);
        assert!(is_partitioned(&items));
    }

    #[test]
    fn test_partition_violation_detected() {
        let items = vec![test_item(1, true), test_item(2, false), test_item(3, true)];
        assert_eq!(pinned_count(&items), 1);
        assert!(!is_partitioned(&items));
    }

    #[test]
    fn test_content_kind_from_mime() {
        assert_eq!(ContentKind::from_mime("image/png"), ContentKind::Image);
        assert_eq!(ContentKind::from_mime("text/html"), ContentKind::Html);
        assert_eq!(ContentKind::from_mime("text/uri-list"), ContentKind::Files);
        assert_eq!(ContentKind::from_mime("text/plain;charset=utf-8"), ContentKind::Text);
    }
}
