//! Backend gateway port
//!
//! Everything clipdeck knows about clipboard history comes through this
//! trait. Capture, storage and ordering live behind it; the client only asks
//! for pages and sends intents identified by item id.

pub mod cclip;
pub mod memory;
pub mod order_book;

use crate::core::item::{FetchOptions, Item, ItemId};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub use cclip::CclipGateway;
pub use memory::MemoryGateway;

/// Payload-less notification that something changed on the backend.
/// Several changes may be coalesced into one notification.
pub type ChangeStream = BoxStream<'static, ()>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed backend response: {0}")]
    Decode(String),
    #[error("item {0} does not exist")]
    NotFound(ItemId),
    #[error("invalid request: {0}")]
    InvalidArgument(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Ordered page of items: pinned first, then unpinned
    async fn fetch_items(&self, options: FetchOptions) -> Result<Vec<Item>, GatewayError>;

    /// Flip the pinned flag, returning the new state
    async fn toggle_pin(&self, id: ItemId) -> Result<bool, GatewayError>;

    /// Flip the favorite flag, returning the new state
    async fn toggle_favorite(&self, id: ItemId) -> Result<bool, GatewayError>;

    /// Place `from` at the position currently held by `to`
    async fn move_item(&self, from: ItemId, to: ItemId) -> Result<(), GatewayError>;

    /// Remove an entry. Deleting an id that is already gone is not an error.
    async fn delete(&self, id: ItemId) -> Result<(), GatewayError>;

    /// Known group names
    async fn groups(&self) -> Result<Vec<String>, GatewayError>;

    /// Put the entry's content back on the system clipboard
    async fn copy_to_clipboard(&self, id: ItemId) -> Result<(), GatewayError>;

    /// Stream of external change notifications
    fn subscribe_changes(&self) -> Result<ChangeStream, GatewayError>;
}

/// Apply the search, group, favorite and paging parts of `options` to an
/// already ordered list. Order is preserved; search only filters.
pub(crate) fn apply_filters(items: Vec<Item>, options: &FetchOptions) -> Vec<Item> {
    use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
    use nucleo_matcher::{Config, Matcher, Utf32Str};

    let pattern = options
        .search
        .as_deref()
        .filter(|query| !query.trim().is_empty())
        .map(|query| Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart));
    let mut matcher = Matcher::new(Config::DEFAULT);
    let mut buf = Vec::new();

    items
        .into_iter()
        .filter(|item| !options.favorite_only || item.is_favorite)
        .filter(|item| match &options.group {
            Some(group) => item.groups.iter().any(|g| g == group),
            None => true,
        })
        .filter(|item| match &pattern {
            Some(pattern) => {
                let haystack = Utf32Str::new(&item.preview, &mut buf);
                pattern.score(haystack, &mut matcher).is_some()
            }
            None => true,
        })
        .skip(options.offset)
        .take(options.limit.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::test_item;

    #[test]
    fn test_apply_filters_keeps_order() {
        let mut items: Vec<Item> = (1..=5).map(|id| test_item(id, id == 1)).collect();
        items[3].is_favorite = true;
        items[4].groups = vec!["code".to_string()];

        let favorites = apply_filters(
            items.clone(),
            &FetchOptions {
                favorite_only: true,
                ..FetchOptions::default()
            },
        );
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, ItemId(4));

        let searched = apply_filters(
            items.clone(),
            &FetchOptions {
                search: Some("entry".to_string()),
                offset: 1,
                limit: Some(2),
                ..FetchOptions::default()
            },
        );
        let ids: Vec<u64> = searched.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![2, 3]);

        let grouped = apply_filters(
            items,
            &FetchOptions {
                group: Some("code".to_string()),
                ..FetchOptions::default()
            },
        );
        assert_eq!(grouped[0].id, ItemId(5));
    }

    #[test]
    fn gateway_trait_is_object_safe() {
        let gateway = MemoryGateway::new();
        let _gateway: &dyn Gateway = &gateway;
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            GatewayError::NotFound(ItemId(7)).to_string(),
            "item 7 does not exist"
        );
    }
}
