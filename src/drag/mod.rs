//! Pointer and keyboard reordering
//!
//! `sensor` decides when a press becomes a drag, `engine` owns the drag
//! session and turns drops into reorder intents for the store.

mod engine;
mod sensor;

pub use engine::{
    CancelReason, Direction, DragEngine, DragLog, DragOutcome, DragSession, PartitionPolicy,
    SlotRect,
};
pub use sensor::{HitMap, RegionRole};
