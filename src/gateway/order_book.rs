//! Backend-side ordering rules shared by the gateway implementations
//!
//! Pinned entries come first in their own order, unpinned entries follow in
//! theirs. The client never computes this; it only displays what a gateway
//! returns, and gateways delegate to this book.

use super::GatewayError;
use crate::core::item::ItemId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pinned: Vec<ItemId>,
    unpinned: Vec<ItemId>,
    favorites: Vec<ItemId>,
}

/// Position of one entry in the authoritative order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub id: ItemId,
    pub is_pinned: bool,
    pub is_favorite: bool,
    /// Index inside the entry's own partition
    pub sort_order: i64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pinned.len() + self.unpinned.len()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.pinned.contains(&id) || self.unpinned.contains(&id)
    }

    pub fn is_pinned(&self, id: ItemId) -> bool {
        self.pinned.contains(&id)
    }

    pub fn is_favorite(&self, id: ItemId) -> bool {
        self.favorites.contains(&id)
    }

    /// A freshly captured entry goes to the top of the unpinned region
    pub fn insert_new(&mut self, id: ItemId) {
        if !self.contains(id) {
            self.unpinned.insert(0, id);
        }
    }

    /// Sync the book with the ids the content store currently holds.
    ///
    /// `live` is newest first. Unknown ids are treated as new captures, ids
    /// that disappeared are dropped. Returns true if anything changed.
    pub fn reconcile(&mut self, live: &[ItemId]) -> bool {
        let before = (self.pinned.len(), self.unpinned.len(), self.favorites.len());

        self.pinned.retain(|id| live.contains(id));
        self.unpinned.retain(|id| live.contains(id));
        self.favorites.retain(|id| live.contains(id));

        let fresh: Vec<ItemId> = live
            .iter()
            .copied()
            .filter(|id| !self.pinned.contains(id) && !self.unpinned.contains(id))
            .collect();
        let added = !fresh.is_empty();
        self.unpinned.splice(0..0, fresh);

        added || before != (self.pinned.len(), self.unpinned.len(), self.favorites.len())
    }

    /// Forget an entry. Returns false if it was not known.
    pub fn remove(&mut self, id: ItemId) -> bool {
        let known = self.contains(id);
        self.pinned.retain(|other| *other != id);
        self.unpinned.retain(|other| *other != id);
        self.favorites.retain(|other| *other != id);
        known
    }

    /// Pinning appends to the pinned region, unpinning puts the entry at the
    /// top of the unpinned region.
    pub fn toggle_pin(&mut self, id: ItemId) -> Result<bool, GatewayError> {
        if let Some(pos) = self.pinned.iter().position(|other| *other == id) {
            self.pinned.remove(pos);
            self.unpinned.insert(0, id);
            Ok(false)
        } else if let Some(pos) = self.unpinned.iter().position(|other| *other == id) {
            self.unpinned.remove(pos);
            self.pinned.push(id);
            Ok(true)
        } else {
            Err(GatewayError::NotFound(id))
        }
    }

    pub fn toggle_favorite(&mut self, id: ItemId) -> Result<bool, GatewayError> {
        if !self.contains(id) {
            return Err(GatewayError::NotFound(id));
        }
        if let Some(pos) = self.favorites.iter().position(|other| *other == id) {
            self.favorites.remove(pos);
            Ok(false)
        } else {
            self.favorites.push(id);
            Ok(true)
        }
    }

    /// Move `from` into the slot currently held by `to`.
    ///
    /// Both ids must be in the same partition; crossing the boundary is a
    /// pin toggle followed by a move. `from == to` is a no-op.
    pub fn move_item(&mut self, from: ItemId, to: ItemId) -> Result<(), GatewayError> {
        if from == to {
            return Ok(());
        }
        let from_pinned = self.locate(from)?;
        let to_pinned = self.locate(to)?;
        if from_pinned != to_pinned {
            return Err(GatewayError::InvalidArgument(format!(
                "cannot move {} across the pinned boundary onto {}",
                from, to
            )));
        }

        let list = if from_pinned {
            &mut self.pinned
        } else {
            &mut self.unpinned
        };
        let (Some(from_pos), Some(to_pos)) = (
            list.iter().position(|id| *id == from),
            list.iter().position(|id| *id == to),
        ) else {
            return Err(GatewayError::NotFound(from));
        };
        let moved = list.remove(from_pos);
        list.insert(to_pos, moved);
        Ok(())
    }

    /// Full authoritative order
    pub fn placements(&self) -> Vec<Placement> {
        let pinned = self.pinned.iter().enumerate().map(|(idx, id)| (idx, *id, true));
        let unpinned = self
            .unpinned
            .iter()
            .enumerate()
            .map(|(idx, id)| (idx, *id, false));
        pinned
            .chain(unpinned)
            .map(|(idx, id, is_pinned)| Placement {
                id,
                is_pinned,
                is_favorite: self.is_favorite(id),
                sort_order: idx as i64,
            })
            .collect()
    }

    fn locate(&self, id: ItemId) -> Result<bool, GatewayError> {
        if self.pinned.contains(&id) {
            Ok(true)
        } else if self.unpinned.contains(&id) {
            Ok(false)
        } else {
            Err(GatewayError::NotFound(id))
        }
    }
}
