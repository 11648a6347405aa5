//! In-memory clipboard history backend
//!
//! Used by `--demo` and by the tests. It honours the same ordering rules as
//! the cclip adapter, records every call it receives, and can hold fetches
//! open or fail selected operations so that races can be replayed
//! deterministically.

use super::order_book::OrderBook;
use super::{apply_filters, ChangeStream, Gateway, GatewayError};
use crate::core::item::{ContentKind, FetchOptions, Item, ItemId};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::{broadcast, oneshot};

/// A call received by the gateway, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Fetch(FetchOptions),
    TogglePin(ItemId),
    ToggleFavorite(ItemId),
    Move(ItemId, ItemId),
    Delete(ItemId),
    Groups,
    Copy(ItemId),
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    Fetch,
    TogglePin,
    ToggleFavorite,
    Move,
    Delete,
}

#[derive(Debug, Clone)]
struct Content {
    kind: ContentKind,
    mime_type: String,
    preview: String,
    created_at: i64,
    groups: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    contents: HashMap<ItemId, Content>,
    book: OrderBook,
    next_id: u64,
    clock: i64,
}

pub struct MemoryGateway {
    state: Mutex<State>,
    calls: Mutex<Vec<GatewayCall>>,
    failures: Mutex<HashMap<FailOn, GatewayError>>,
    hold_fetches: Mutex<bool>,
    held: Mutex<VecDeque<(FetchOptions, oneshot::Sender<()>)>>,
    changes: broadcast::Sender<()>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(State {
                next_id: 1,
                clock: 1_700_000_000,
                ..State::default()
            }),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            hold_fetches: Mutex::new(false),
            held: Mutex::new(VecDeque::new()),
            changes,
        }
    }

    /// Record a new clipboard capture without notifying subscribers
    pub fn insert(&self, mime_type: &str, preview: &str, groups: &[&str]) -> ItemId {
        let mut state = lock(&self.state);
        let id = ItemId(state.next_id);
        state.next_id += 1;
        state.clock += 1;
        let content = Content {
            kind: ContentKind::from_mime(mime_type),
            mime_type: mime_type.to_string(),
            preview: preview.to_string(),
            created_at: state.clock,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        };
        state.contents.insert(id, content);
        state.book.insert_new(id);
        id
    }

    /// Simulate a capture made by another process
    #[cfg(test)]
    pub fn capture(&self, preview: &str) -> ItemId {
        let id = self.insert("text/plain", preview, &[]);
        self.notify_external();
        id
    }

    /// Simulate a deletion made by another process
    #[cfg(test)]
    pub fn remove_external(&self, id: ItemId) {
        {
            let mut state = lock(&self.state);
            state.contents.remove(&id);
            state.book.remove(id);
        }
        self.notify_external();
    }

    #[cfg(test)]
    fn notify_external(&self) {
        // No receivers is fine
        let _ = self.changes.send(());
    }

    /// Pin an entry directly, bypassing call recording
    pub fn pin(&self, id: ItemId) {
        let mut state = lock(&self.state);
        if !state.book.is_pinned(id) {
            let _ = state.book.toggle_pin(id);
        }
    }

    /// Current authoritative order, for assertions
    pub fn order(&self) -> Vec<ItemId> {
        lock(&self.state)
            .book
            .placements()
            .into_iter()
            .map(|placement| placement.id)
            .collect()
    }

    #[cfg(test)]
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    #[cfg(test)]
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Calls other than fetches
    #[cfg(test)]
    pub fn mutation_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, GatewayCall::Fetch(_)))
            .collect()
    }

    #[cfg(test)]
    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::Fetch(_)))
            .count()
    }

    #[cfg(test)]
    pub fn fail(&self, op: FailOn, error: GatewayError) {
        lock(&self.failures).insert(op, error);
    }

    /// While set, every fetch computes its result immediately but does not
    /// complete until released with [`MemoryGateway::release_fetch`].
    #[cfg(test)]
    pub fn set_hold_fetches(&self, hold: bool) {
        *lock(&self.hold_fetches) = hold;
    }

    #[cfg(test)]
    fn held_fetches(&self) -> usize {
        lock(&self.held).len()
    }

    /// Wait until at least `count` fetches are being held
    #[cfg(test)]
    pub async fn wait_for_held(&self, count: usize) {
        while self.held_fetches() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Complete the held fetch whose search string equals `search`.
    /// Returns false if no such fetch is held.
    #[cfg(test)]
    pub fn release_fetch(&self, search: Option<&str>) -> bool {
        let mut held = lock(&self.held);
        let Some(pos) = held
            .iter()
            .position(|(options, _)| options.search.as_deref() == search)
        else {
            return false;
        };
        if let Some((_, gate)) = held.remove(pos) {
            let _ = gate.send(());
        }
        true
    }

    /// Populate a few hundred entries for `--demo`
    pub fn seed_demo(&self) {
        let samples: &[(&str, &str, &[&str])] = &[
            ("text/plain", "git rebase -i HEAD~3", &["code"]),
            ("text/plain", "https://docs.rs/ratatui/latest/ratatui/", &["links"]),
            ("text/html", "<b>Quarterly</b> report draft", &[]),
            ("image/png", "screenshot 1920x1080", &["images"]),
            ("text/plain", "fn main() {\n    println!(\"hello\");\n}", &["code"]),
            ("text/uri-list", "file:///home/user/notes.md", &[]),
            ("text/plain", "ssh deploy@10.0.0.12", &["code"]),
            ("application/rtf", "{\\rtf1 meeting notes}", &[]),
            ("text/plain", "Thanks, see you tomorrow!", &[]),
            ("image/jpeg", "photo 4032x3024", &["images"]),
        ];
        for round in 0..30 {
            for (mime, preview, groups) in samples {
                let preview = if round == 0 {
                    preview.to_string()
                } else {
                    format!("{} ({})", preview, round)
                };
                self.insert(mime, &preview, groups);
            }
        }
        let order = self.order();
        for id in order.iter().take(3) {
            self.pin(*id);
        }
    }

    fn record(&self, call: GatewayCall) {
        lock(&self.calls).push(call);
    }

    fn check_failure(&self, op: FailOn) -> Result<(), GatewayError> {
        match lock(&self.failures).get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn snapshot(&self, options: &FetchOptions) -> Vec<Item> {
        let state = lock(&self.state);
        let ordered = state
            .book
            .placements()
            .into_iter()
            .filter_map(|placement| {
                let content = state.contents.get(&placement.id)?;
                Some(Item {
                    id: placement.id,
                    kind: content.kind,
                    mime_type: content.mime_type.clone(),
                    preview: content.preview.clone(),
                    is_pinned: placement.is_pinned,
                    is_favorite: placement.is_favorite,
                    sort_order: placement.sort_order,
                    created_at: content.created_at,
                    groups: content.groups.clone(),
                })
            })
            .collect();
        apply_filters(ordered, options)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panicking test thread must not wedge the others
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn fetch_items(&self, options: FetchOptions) -> Result<Vec<Item>, GatewayError> {
        self.record(GatewayCall::Fetch(options.clone()));
        let result = self.check_failure(FailOn::Fetch).map(|_| self.snapshot(&options));

        let hold = *lock(&self.hold_fetches);
        if hold {
            let (tx, gate) = oneshot::channel();
            lock(&self.held).push_back((options, tx));
            let _ = gate.await;
        }
        result
    }

    async fn toggle_pin(&self, id: ItemId) -> Result<bool, GatewayError> {
        self.record(GatewayCall::TogglePin(id));
        self.check_failure(FailOn::TogglePin)?;
        lock(&self.state).book.toggle_pin(id)
    }

    async fn toggle_favorite(&self, id: ItemId) -> Result<bool, GatewayError> {
        self.record(GatewayCall::ToggleFavorite(id));
        self.check_failure(FailOn::ToggleFavorite)?;
        lock(&self.state).book.toggle_favorite(id)
    }

    async fn move_item(&self, from: ItemId, to: ItemId) -> Result<(), GatewayError> {
        self.record(GatewayCall::Move(from, to));
        self.check_failure(FailOn::Move)?;
        lock(&self.state).book.move_item(from, to)
    }

    async fn delete(&self, id: ItemId) -> Result<(), GatewayError> {
        self.record(GatewayCall::Delete(id));
        self.check_failure(FailOn::Delete)?;
        let mut state = lock(&self.state);
        state.contents.remove(&id);
        state.book.remove(id);
        Ok(())
    }

    async fn groups(&self) -> Result<Vec<String>, GatewayError> {
        self.record(GatewayCall::Groups);
        let state = lock(&self.state);
        let mut groups: Vec<String> = state
            .contents
            .values()
            .flat_map(|content| content.groups.iter().cloned())
            .collect();
        groups.sort();
        groups.dedup();
        Ok(groups)
    }

    async fn copy_to_clipboard(&self, id: ItemId) -> Result<(), GatewayError> {
        self.record(GatewayCall::Copy(id));
        if lock(&self.state).contents.contains_key(&id) {
            Ok(())
        } else {
            Err(GatewayError::NotFound(id))
        }
    }

    fn subscribe_changes(&self) -> Result<ChangeStream, GatewayError> {
        let rx = self.changes.subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                // Lagging only means several changes were coalesced
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => Some(((), rx)),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        });
        Ok(stream.boxed())
    }
}
