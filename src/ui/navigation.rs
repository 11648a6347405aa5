//! Keyboard navigation over the logical item list
//!
//! The list length is read through `ListAccess` on every key press, so a
//! delete or refresh that landed between two presses is always taken into
//! account.

use crate::core::item::ItemId;
use crate::store::ItemStore;

pub trait ListAccess {
    fn item_count(&self) -> usize;
    fn item_id(&self, index: usize) -> Option<ItemId>;
    fn active_index(&self) -> Option<usize>;
}

impl ListAccess for ItemStore {
    fn item_count(&self) -> usize {
        self.len()
    }

    fn item_id(&self, index: usize) -> Option<ItemId> {
        self.items().get(index).map(|item| item.id)
    }

    fn active_index(&self) -> Option<usize> {
        ItemStore::active_index(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Enter,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Unchanged,
    /// New active index; the caller scrolls it into view
    Moved(usize),
    Activate(ItemId),
    Delete(ItemId),
}

/// Up and Down stop at the ends of the list; they never wrap
#[derive(Debug, Clone, Copy)]
pub struct Navigator {
    pub page_rows: usize,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            page_rows: 10,
        }
    }
}

impl Navigator {
    pub fn handle(&self, key: NavKey, list: &dyn ListAccess) -> NavOutcome {
        let count = list.item_count();
        if count == 0 {
            return NavOutcome::Unchanged;
        }
        let last = count - 1;
        let current = list.active_index().map(|idx| idx.min(last));

        let target = match key {
            NavKey::Up => current.map_or(0, |idx| idx.saturating_sub(1)),
            NavKey::Down => current.map_or(0, |idx| (idx + 1).min(last)),
            NavKey::PageUp => current.unwrap_or(0).saturating_sub(self.page_rows.max(1)),
            NavKey::PageDown => (current.unwrap_or(0) + self.page_rows.max(1)).min(last),
            NavKey::Home => 0,
            NavKey::End => last,
            NavKey::Enter => {
                return current
                    .and_then(|idx| list.item_id(idx))
                    .map_or(NavOutcome::Unchanged, NavOutcome::Activate);
            }
            NavKey::Delete => {
                return current
                    .and_then(|idx| list.item_id(idx))
                    .map_or(NavOutcome::Unchanged, NavOutcome::Delete);
            }
        };

        if Some(target) == list.active_index() {
            NavOutcome::Unchanged
        } else {
            NavOutcome::Moved(target)
        }
    }
}
