//! Ordered item store
//!
//! Single owner of the visible clipboard list. Every read the UI does comes
//! from here and every write goes through here to the gateway.
//!
//! Gateway calls run as spawned tasks and report back as [`StoreMessage`]s on
//! a channel owned by the caller; the event loop hands each message to
//! [`ItemStore::handle`]. Fetches carry the generation they were issued
//! with, and only the newest generation is ever applied, whatever order the
//! responses arrive in.
//!
//! Delete is optimistic (local splice, then a fire-and-forget call, no
//! rollback). Pin, favorite and move are never applied locally: they wait
//! for the gateway and then refetch, because only the backend knows where an
//! entry ends up.

use crate::core::debug_logger;
use crate::core::item::{pinned_count, FetchOptions, Item, ItemId};
use crate::gateway::{Gateway, GatewayError};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// "Move item `from` to the position of item `to`", optionally flipping its
/// pinned state first when the drop crossed the partition boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderIntent {
    pub from: ItemId,
    pub to: ItemId,
    pub toggle_pin_first: bool,
}

/// Backend mutations that are followed by a refetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    TogglePin(ItemId),
    ToggleFavorite(ItemId),
    Reorder(ReorderIntent),
}

impl Mutation {
    /// The item the mutation acts on
    pub fn subject(&self) -> ItemId {
        match self {
            Mutation::TogglePin(id) | Mutation::ToggleFavorite(id) => *id,
            Mutation::Reorder(intent) => intent.from,
        }
    }
}

#[derive(Debug)]
pub enum StoreMessage {
    Fetched {
        generation: u64,
        result: Result<Vec<Item>, GatewayError>,
    },
    MutationSettled {
        mutation: Mutation,
        result: Result<(), GatewayError>,
    },
    DeleteSettled {
        id: ItemId,
        result: Result<(), GatewayError>,
    },
    ExternalChange,
}

/// A mutation that finished and the generation of the refetch it caused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub mutation: Mutation,
    pub refetch: u64,
}

/// Receiving half of the store's message channel
pub struct StoreEvents {
    rx: mpsc::UnboundedReceiver<StoreMessage>,
}

impl StoreEvents {
    pub async fn next(&mut self) -> Option<StoreMessage> {
        self.rx.recv().await
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Page size requested from the gateway (`None` = everything)
    pub page_size: Option<usize>,
}

/// Per-call override of the filter state used by a fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOverride {
    /// Search string to send instead of the current query
    pub search: Option<String>,
}

pub struct ItemStore {
    gateway: Arc<dyn Gateway>,
    config: StoreConfig,
    items: Vec<Item>,
    is_loading: bool,
    search_query: String,
    selected_group: Option<String>,
    favorite_only: bool,
    active_index: Option<usize>,
    fetch_generation: u64,
    reset_token: u64,
    tx: mpsc::UnboundedSender<StoreMessage>,
    revision: watch::Sender<u64>,
    listeners: Vec<JoinHandle<()>>,
    disposed: bool,
}

impl ItemStore {
    /// Create an isolated store and the channel its async work reports on
    pub fn create(gateway: Arc<dyn Gateway>, config: StoreConfig) -> (Self, StoreEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (revision, _) = watch::channel(0);
        let store = Self {
            gateway,
            config,
            items: Vec::new(),
            is_loading: false,
            search_query: String::new(),
            selected_group: None,
            favorite_only: false,
            active_index: None,
            fetch_generation: 0,
            reset_token: 0,
            tx,
            revision,
            listeners: Vec::new(),
            disposed: false,
        };
        (store, StoreEvents { rx })
    }

    /// Revision counter, bumped whenever readable state changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Forward backend change notifications into the message channel
    pub fn listen_external(&mut self) -> Result<(), GatewayError> {
        let mut changes = self.gateway.subscribe_changes()?;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            while changes.next().await.is_some() {
                if tx.send(StoreMessage::ExternalChange).is_err() {
                    return;
                }
            }
        });
        self.listeners.push(handle);
        Ok(())
    }

    /// Stop listening and ignore anything still in flight
    pub fn dispose(&mut self) {
        for handle in self.listeners.drain(..) {
            handle.abort();
        }
        self.disposed = true;
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn selected_group(&self) -> Option<&str> {
        self.selected_group.as_deref()
    }

    pub fn favorite_only(&self) -> bool {
        self.favorite_only
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn active_item(&self) -> Option<&Item> {
        self.active_index.and_then(|idx| self.items.get(idx))
    }

    pub fn fetch_generation(&self) -> u64 {
        self.fetch_generation
    }

    pub fn reset_token(&self) -> u64 {
        self.reset_token
    }

    /// Leading pinned items, rescanned on every call
    pub fn pinned_count(&self) -> usize {
        pinned_count(&self.items)
    }

    pub fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    // ------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------

    /// Update the query without fetching; callers debounce and fetch
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query != self.search_query {
            self.search_query = query;
            self.active_index = None;
            self.bump();
        }
    }

    pub fn set_selected_group(&mut self, group: Option<String>) {
        self.selected_group = group;
        self.active_index = None;
        self.bump();
        self.fetch();
    }

    pub fn set_favorite_only(&mut self, favorite_only: bool) {
        self.favorite_only = favorite_only;
        self.active_index = None;
        self.bump();
        self.fetch();
    }

    /// Move the keyboard cursor, clamped to the current list
    pub fn set_active_index(&mut self, index: Option<usize>) {
        let clamped = match index {
            Some(_) if self.items.is_empty() => None,
            Some(idx) => Some(idx.min(self.items.len() - 1)),
            None => None,
        };
        if clamped != self.active_index {
            self.active_index = clamped;
            self.bump();
        }
    }

    /// Drop filters, signal a visual reset and refetch with an explicitly
    /// empty search
    pub fn reset_view(&mut self) {
        self.search_query.clear();
        self.selected_group = None;
        self.favorite_only = false;
        self.active_index = None;
        self.reset_token += 1;
        self.bump();
        self.fetch_with(FetchOverride {
            search: Some(String::new()),
        });
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    pub fn fetch(&mut self) {
        self.fetch_with(FetchOverride::default());
    }

    /// Issue a fetch. Never fails; a failed or superseded fetch simply
    /// leaves the list as it was.
    pub fn fetch_with(&mut self, filter: FetchOverride) {
        if self.disposed {
            return;
        }
        self.fetch_generation += 1;
        let generation = self.fetch_generation;
        self.is_loading = true;

        let search = filter.search.or_else(|| {
            if self.search_query.is_empty() {
                None
            } else {
                Some(self.search_query.clone())
            }
        });
        let options = FetchOptions {
            search,
            group: self.selected_group.clone(),
            favorite_only: self.favorite_only,
            limit: self.config.page_size,
            offset: 0,
        };
        debug_logger::log_fetch(
            generation,
            options.search.as_deref(),
            options.group.as_deref(),
        );
        self.bump();

        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway.fetch_items(options).await;
            let _ = tx.send(StoreMessage::Fetched { generation, result });
        });
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn toggle_pin(&mut self, id: ItemId) {
        self.spawn_mutation(Mutation::TogglePin(id));
    }

    pub fn toggle_favorite(&mut self, id: ItemId) {
        self.spawn_mutation(Mutation::ToggleFavorite(id));
    }

    /// Move `from` to the position of `to`. Same ids do nothing at all.
    pub fn move_item(&mut self, from: ItemId, to: ItemId) {
        self.reorder(ReorderIntent {
            from,
            to,
            toggle_pin_first: false,
        });
    }

    /// Apply a drag or keyboard reorder: optional pin toggle, then move,
    /// then a single refetch.
    pub fn reorder(&mut self, intent: ReorderIntent) {
        if intent.from == intent.to {
            return;
        }
        self.spawn_mutation(Mutation::Reorder(intent));
    }

    /// Remove locally right away, tell the backend in the background.
    /// A backend failure is logged and not rolled back; the next refresh
    /// reconciles.
    pub fn delete(&mut self, id: ItemId) {
        if self.disposed {
            return;
        }
        if let Some(pos) = self.index_of(id) {
            self.items.remove(pos);
            self.clamp_active_index();
            self.bump();
        }

        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway.delete(id).await;
            let _ = tx.send(StoreMessage::DeleteSettled { id, result });
        });
    }

    fn spawn_mutation(&mut self, mutation: Mutation) {
        if self.disposed {
            return;
        }
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = run_mutation(gateway.as_ref(), &mutation).await;
            let _ = tx.send(StoreMessage::MutationSettled { mutation, result });
        });
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    /// Apply one completion. Errors are logged here and never propagate.
    /// A settled mutation reports the generation of its refetch, so callers
    /// can wait for the list that reflects it.
    pub fn handle(&mut self, message: StoreMessage) -> Option<Settled> {
        if self.disposed {
            return None;
        }
        match message {
            StoreMessage::Fetched { generation, result } => {
                if generation != self.fetch_generation {
                    debug_logger::log_stale(generation, self.fetch_generation);
                    return None;
                }
                self.is_loading = false;
                match result {
                    Ok(items) => {
                        debug_logger::log_applied(generation, items.len(), pinned_count(&items));
                        self.items = items;
                        self.clamp_active_index();
                    }
                    Err(e) => debug_logger::log_error("fetch", &e),
                }
                self.bump();
            }
            StoreMessage::MutationSettled { mutation, result } => {
                if let Err(e) = result {
                    debug_logger::log_error(&format!("{:?}", mutation), &e);
                }
                self.fetch();
                return Some(Settled {
                    mutation,
                    refetch: self.fetch_generation,
                });
            }
            StoreMessage::DeleteSettled { id, result } => {
                if let Err(e) = result {
                    debug_logger::log_error(&format!("delete {}", id), &e);
                }
            }
            StoreMessage::ExternalChange => {
                debug_logger::log_event("external change");
                self.fetch();
            }
        }
        None
    }

    fn clamp_active_index(&mut self) {
        self.active_index = match self.active_index {
            Some(_) if self.items.is_empty() => None,
            Some(idx) => Some(idx.min(self.items.len() - 1)),
            None => None,
        };
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

impl Drop for ItemStore {
    fn drop(&mut self) {
        for handle in self.listeners.drain(..) {
            handle.abort();
        }
    }
}

async fn run_mutation(gateway: &dyn Gateway, mutation: &Mutation) -> Result<(), GatewayError> {
    match mutation {
        Mutation::TogglePin(id) => gateway.toggle_pin(*id).await.map(|_| ()),
        Mutation::ToggleFavorite(id) => gateway.toggle_favorite(*id).await.map(|_| ()),
        Mutation::Reorder(intent) => {
            if intent.toggle_pin_first {
                gateway.toggle_pin(intent.from).await?;
            }
            gateway.move_item(intent.from, intent.to).await
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::item::is_partitioned;
    use crate::gateway::memory::{FailOn, GatewayCall};
    use crate::gateway::MemoryGateway;
    use std::time::Duration;

    /// Handle messages until nothing arrives for a short while
    pub(crate) async fn settle(store: &mut ItemStore, events: &mut StoreEvents) {
        while let Ok(Some(message)) =
            tokio::time::timeout(Duration::from_millis(50), events.next()).await
        {
            store.handle(message);
        }
    }

    fn ids(items: &[Item]) -> Vec<ItemId> {
        items.iter().map(|item| item.id).collect()
    }

    /// Gateway holding P1, P2 (pinned) then A, B, C
    pub(crate) fn scenario_gateway() -> (Arc<MemoryGateway>, [ItemId; 5]) {
        let gateway = Arc::new(MemoryGateway::new());
        let c = gateway.insert("text/plain", "C", &[]);
        let b = gateway.insert("text/plain", "B", &[]);
        let a = gateway.insert("text/plain", "A", &[]);
        let p2 = gateway.insert("text/plain", "P2", &[]);
        let p1 = gateway.insert("text/plain", "P1", &[]);
        gateway.pin(p1);
        gateway.pin(p2);
        (gateway, [p1, p2, a, b, c])
    }

    async fn loaded_store(gateway: Arc<MemoryGateway>) -> (ItemStore, StoreEvents) {
        let (mut store, mut events) = ItemStore::create(gateway.clone(), StoreConfig::default());
        store.fetch();
        settle(&mut store, &mut events).await;
        gateway.clear_calls();
        (store, events)
    }

    #[tokio::test]
    async fn test_fetch_applies_backend_order() {
        let (gateway, [p1, p2, a, b, c]) = scenario_gateway();
        let (store, _events) = loaded_store(gateway).await;
        assert_eq!(ids(store.items()), vec![p1, p2, a, b, c]);
        assert_eq!(store.pinned_count(), 2);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_out_of_order_search_responses_keep_newest() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.insert("text/plain", "apple", &[]);
        gateway.insert("text/plain", "abba", &[]);
        gateway.insert("text/plain", "abc def", &[]);
        let (mut store, mut events) = ItemStore::create(gateway.clone(), StoreConfig::default());
        gateway.set_hold_fetches(true);

        for query in ["a", "ab", "abc"] {
            store.set_search_query(query);
            store.fetch();
        }
        gateway.wait_for_held(3).await;
        assert!(store.is_loading());

        for query in ["abc", "a", "ab"] {
            assert!(gateway.release_fetch(Some(query)));
            let message = events.next().await.unwrap();
            store.handle(message);
        }

        let previews: Vec<&str> = store.items().iter().map(|i| i.preview.as_str()).collect();
        assert_eq!(previews, vec!["abc def"]);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_stale_suppression_for_every_completion_order() {
        let orders = [
            ["a", "ab", "abc"],
            ["a", "abc", "ab"],
            ["ab", "a", "abc"],
            ["ab", "abc", "a"],
            ["abc", "a", "ab"],
            ["abc", "ab", "a"],
        ];
        for order in orders {
            let gateway = Arc::new(MemoryGateway::new());
            gateway.insert("text/plain", "a", &[]);
            gateway.insert("text/plain", "ab", &[]);
            gateway.insert("text/plain", "abc", &[]);
            let (mut store, mut events) =
                ItemStore::create(gateway.clone(), StoreConfig::default());
            gateway.set_hold_fetches(true);

            for query in ["a", "ab", "abc"] {
                store.set_search_query(query);
                store.fetch();
            }
            gateway.wait_for_held(3).await;
            for query in order {
                gateway.release_fetch(Some(query));
                let message = events.next().await.unwrap();
                store.handle(message);
            }
            assert_eq!(store.len(), 1, "completion order {:?}", order);
            assert_eq!(store.items()[0].preview, "abc");
        }
    }

    #[tokio::test]
    async fn test_loading_stays_set_while_newer_fetch_pending() {
        let (gateway, _) = scenario_gateway();
        let (mut store, mut events) = ItemStore::create(gateway.clone(), StoreConfig::default());
        gateway.set_hold_fetches(true);
        store.fetch();
        store.set_search_query("P");
        store.fetch();
        gateway.wait_for_held(2).await;

        gateway.release_fetch(None);
        store.handle(events.next().await.unwrap());
        assert!(store.is_loading());
        assert!(store.is_empty());

        gateway.release_fetch(Some("P"));
        store.handle(events.next().await.unwrap());
        assert!(!store.is_loading());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_last_good_items() {
        let (gateway, [p1, ..]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        gateway.fail(FailOn::Fetch, GatewayError::Transport("ipc down".into()));

        store.fetch();
        settle(&mut store, &mut events).await;
        assert_eq!(store.len(), 5);
        assert_eq!(store.items()[0].id, p1);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_toggle_pin_uses_backend_order() {
        let (gateway, [p1, p2, a, b, c]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;

        store.toggle_pin(a);
        // Nothing changes locally before the backend answers
        assert_eq!(store.pinned_count(), 2);
        settle(&mut store, &mut events).await;

        assert_eq!(ids(store.items()), vec![p1, p2, a, b, c]);
        assert!(store.items()[2].is_pinned);
        assert_eq!(store.pinned_count(), 3);
        assert_eq!(
            gateway.calls()[0],
            GatewayCall::TogglePin(a),
            "mutation must precede the refresh"
        );
        assert_eq!(gateway.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_toggle_still_refreshes_without_local_change() {
        let (gateway, [p1, p2, a, b, c]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        gateway.fail(FailOn::TogglePin, GatewayError::NotFound(a));

        store.toggle_pin(a);
        settle(&mut store, &mut events).await;
        assert_eq!(ids(store.items()), vec![p1, p2, a, b, c]);
        assert_eq!(store.pinned_count(), 2);
        assert_eq!(gateway.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_move_same_id_is_noop() {
        let (gateway, [_, _, a, ..]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        let before = store.items().to_vec();

        store.move_item(a, a);
        settle(&mut store, &mut events).await;
        assert!(gateway.calls().is_empty());
        assert_eq!(store.items(), before.as_slice());
    }

    #[tokio::test]
    async fn test_move_then_single_refetch() {
        let (gateway, [p1, p2, a, b, c]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;

        store.move_item(c, a);
        settle(&mut store, &mut events).await;
        assert_eq!(ids(store.items()), vec![p1, p2, c, a, b]);
        assert_eq!(gateway.mutation_calls(), vec![GatewayCall::Move(c, a)]);
        assert_eq!(gateway.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_cross_partition_reorder_toggles_then_moves() {
        let (gateway, [p1, p2, a, b, c]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        let dragged = store.items()[4].id;
        let target = store.items()[1].id;

        store.reorder(ReorderIntent {
            from: dragged,
            to: target,
            toggle_pin_first: true,
        });
        settle(&mut store, &mut events).await;

        let calls = gateway.calls();
        assert_eq!(
            calls,
            vec![
                GatewayCall::TogglePin(c),
                GatewayCall::Move(c, p2),
                GatewayCall::Fetch(FetchOptions::default()),
            ]
        );
        assert_eq!(ids(store.items()), vec![p1, c, p2, a, b]);
        assert_eq!(store.pinned_count(), 3);
        assert!(is_partitioned(store.items()));
    }

    #[tokio::test]
    async fn test_delete_is_optimistic_and_not_rolled_back() {
        let (gateway, [p1, p2, a, b, c]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        gateway.fail(FailOn::Delete, GatewayError::Transport("offline".into()));
        store.set_active_index(Some(4));

        store.delete(c);
        assert_eq!(ids(store.items()), vec![p1, p2, a, b]);
        assert_eq!(store.active_index(), Some(3));

        settle(&mut store, &mut events).await;
        assert_eq!(ids(store.items()), vec![p1, p2, a, b]);
        assert_eq!(gateway.mutation_calls(), vec![GatewayCall::Delete(c)]);
        assert_eq!(gateway.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_last_item_clears_active_index() {
        let gateway = Arc::new(MemoryGateway::new());
        let only = gateway.insert("text/plain", "only", &[]);
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        store.set_active_index(Some(0));

        store.delete(only);
        assert!(store.is_empty());
        assert_eq!(store.active_index(), None);
        settle(&mut store, &mut events).await;
    }

    #[tokio::test]
    async fn test_external_change_refetches() {
        let (gateway, _) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        store.listen_external().unwrap();

        let fresh = gateway.capture("fresh");
        settle(&mut store, &mut events).await;
        assert_eq!(store.len(), 6);
        assert_eq!(store.items()[2].id, fresh);
        assert!(is_partitioned(store.items()));
    }

    #[tokio::test]
    async fn test_external_change_cannot_overwrite_newer_user_fetch() {
        let (gateway, _) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        gateway.set_hold_fetches(true);

        // Push notification first, user search right after
        store.handle(StoreMessage::ExternalChange);
        store.set_search_query("P");
        store.fetch();
        gateway.wait_for_held(2).await;

        gateway.release_fetch(Some("P"));
        store.handle(events.next().await.unwrap());
        gateway.release_fetch(None);
        store.handle(events.next().await.unwrap());

        assert_eq!(store.len(), 2);
        assert!(store.items().iter().all(|item| item.is_pinned));
    }

    #[tokio::test]
    async fn test_search_query_does_not_fetch_but_group_does() {
        let (gateway, _) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;

        store.set_search_query("A");
        settle(&mut store, &mut events).await;
        assert_eq!(gateway.fetch_count(), 0);

        store.set_selected_group(Some("code".into()));
        settle(&mut store, &mut events).await;
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Fetch(FetchOptions {
                search: Some("A".into()),
                group: Some("code".into()),
                ..FetchOptions::default()
            })]
        );
    }

    #[tokio::test]
    async fn test_reset_view_clears_filters_and_bumps_token() {
        let (gateway, _) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        store.set_search_query("zzz");
        store.set_selected_group(Some("code".into()));
        settle(&mut store, &mut events).await;
        gateway.clear_calls();
        let token = store.reset_token();

        store.reset_view();
        settle(&mut store, &mut events).await;
        assert_eq!(store.reset_token(), token + 1);
        assert_eq!(store.search_query(), "");
        assert_eq!(store.selected_group(), None);
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Fetch(FetchOptions {
                search: Some(String::new()),
                ..FetchOptions::default()
            })]
        );
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn test_active_index_clamped_when_list_shrinks() {
        let (gateway, [_, _, a, b, c]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        store.set_active_index(Some(10));
        assert_eq!(store.active_index(), Some(4));

        gateway.remove_external(a);
        gateway.remove_external(b);
        gateway.remove_external(c);
        store.fetch();
        settle(&mut store, &mut events).await;
        assert_eq!(store.active_index(), Some(1));
    }

    #[tokio::test]
    async fn test_filter_change_resets_active_index() {
        let (gateway, _) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        store.set_active_index(Some(2));
        store.set_favorite_only(true);
        assert_eq!(store.active_index(), None);
        settle(&mut store, &mut events).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_partition_holds_through_mixed_operations() {
        let (gateway, [p1, _, a, b, c]) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;

        store.toggle_pin(b);
        settle(&mut store, &mut events).await;
        assert!(is_partitioned(store.items()));
        store.toggle_pin(p1);
        settle(&mut store, &mut events).await;
        assert!(is_partitioned(store.items()));
        store.move_item(c, a);
        settle(&mut store, &mut events).await;
        assert!(is_partitioned(store.items()));
        store.delete(a);
        assert!(is_partitioned(store.items()));
        gateway.capture("new");
        store.fetch();
        settle(&mut store, &mut events).await;
        assert!(is_partitioned(store.items()));
    }

    #[tokio::test]
    async fn test_settled_mutation_reports_its_refetch() {
        let (gateway, [_, _, a, ..]) = scenario_gateway();
        let (mut store, _events) = loaded_store(gateway).await;
        let before = store.fetch_generation();

        let settled = store.handle(StoreMessage::MutationSettled {
            mutation: Mutation::TogglePin(a),
            result: Ok(()),
        });
        assert_eq!(
            settled,
            Some(Settled {
                mutation: Mutation::TogglePin(a),
                refetch: before + 1,
            })
        );
        assert!(store.is_loading());
        assert_eq!(store.handle(StoreMessage::ExternalChange), None);
    }

    #[tokio::test]
    async fn test_disposed_store_ignores_messages() {
        let (gateway, _) = scenario_gateway();
        let (mut store, mut events) = loaded_store(gateway.clone()).await;
        store.dispose();
        store.handle(StoreMessage::Fetched {
            generation: store.fetch_generation(),
            result: Ok(Vec::new()),
        });
        assert_eq!(store.len(), 5);
        store.fetch();
        settle(&mut store, &mut events).await;
        assert_eq!(gateway.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_revisions() {
        let (gateway, _) = scenario_gateway();
        let (mut store, mut events) = ItemStore::create(gateway, StoreConfig::default());
        let mut revisions = store.subscribe();
        let start = *revisions.borrow_and_update();
        store.fetch();
        settle(&mut store, &mut events).await;
        assert!(revisions.has_changed().unwrap());
        assert!(*revisions.borrow() > start);
    }
}
