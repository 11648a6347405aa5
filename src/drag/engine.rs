//! Drag reorder state machine
//!
//! `Idle -> Pressed -> Dragging -> {Dropped, Cancelled} -> Idle`
//!
//! The engine only ever looks at what is currently rendered: targets are
//! resolved against the [`SlotRect`]s the renderer produced for this frame,
//! never against off-screen items. A finished drag yields one
//! [`ReorderIntent`] for the store; everything else yields nothing.

use super::sensor::{HitMap, PointerSensor};
use crate::core::debug_logger;
use crate::core::item::{Item, ItemId};
use crate::store::ReorderIntent;
use ratatui::layout::{Position, Rect};
use serde::Deserialize;

/// How drags across the pinned boundary are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionPolicy {
    /// Targets in the other partition are invisible to collision detection
    Strict,
    /// Crossing the boundary flips the pinned state, then moves
    #[default]
    AutoToggle,
}

impl PartitionPolicy {
    fn accepts(self, active_pinned: bool, target_pinned: bool) -> bool {
        match self {
            PartitionPolicy::Strict => active_pinned == target_pinned,
            PartitionPolicy::AutoToggle => true,
        }
    }
}

/// Screen rectangle of one rendered row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRect {
    /// Logical index in the store's item list
    pub index: usize,
    pub id: ItemId,
    pub is_pinned: bool,
    pub rect: Rect,
}

impl SlotRect {
    fn contains_row(&self, row: u16) -> bool {
        row >= self.rect.y && row < self.rect.bottom()
    }

    /// Twice the distance from `row` to the vertical center, to stay integral
    fn center_distance(&self, row: u16) -> u32 {
        let center2 = u32::from(self.rect.y) * 2 + u32::from(self.rect.height);
        (u32::from(row) * 2).abs_diff(center2)
    }
}

/// Floating copy of the dragged row, drawn on top of the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOverlay {
    pub id: ItemId,
    pub label: String,
    pub is_pinned: bool,
    pub column: u16,
    pub row: u16,
    /// Row offset of the grab point inside the original slot
    pub grab_offset: u16,
}

impl DragOverlay {
    /// Top row at which the overlay is drawn
    pub fn top(&self) -> u16 {
        self.row.saturating_sub(self.grab_offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub session_id: u64,
    pub active_id: ItemId,
    pub active_pinned: bool,
    pub origin_slot: usize,
    pub over_slot: Option<usize>,
    pub overlay: DragOverlay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Pressed {
        slot: usize,
        id: ItemId,
        is_pinned: bool,
        label: String,
        grab_offset: u16,
    },
    Dragging(DragSession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Escape,
    NoTarget,
    SameSlot,
    /// Session ended because the list was reset underneath it
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Nothing for the caller to do
    Ignored,
    /// Press recorded on a draggable row
    Armed,
    /// Press and release without crossing the threshold
    Clicked(usize),
    Started(u64),
    Moved,
    Dropped(ReorderIntent),
    Cancelled(CancelReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Hooks fired on session transitions
pub trait DragObserver: Send {
    fn on_drag_start(&mut self, _session: &DragSession) {}
    fn on_drag_end(&mut self, _session: &DragSession, _intent: &ReorderIntent) {}
    fn on_drag_cancel(&mut self, _session: &DragSession, _reason: CancelReason) {}
}

/// Observer writing drag transitions to the debug log
pub struct DragLog;

impl DragObserver for DragLog {
    fn on_drag_start(&mut self, session: &DragSession) {
        debug_logger::log_drag(
            "start",
            Some(session.active_id),
            &format!("session {} from slot {}", session.session_id, session.origin_slot),
        );
    }

    fn on_drag_end(&mut self, session: &DragSession, intent: &ReorderIntent) {
        debug_logger::log_drag(
            "drop",
            Some(session.active_id),
            &format!(
                "onto {} (toggle pin first: {})",
                intent.to, intent.toggle_pin_first
            ),
        );
    }

    fn on_drag_cancel(&mut self, session: &DragSession, reason: CancelReason) {
        debug_logger::log_drag("cancel", Some(session.active_id), &format!("{:?}", reason));
    }
}

pub struct DragEngine {
    policy: PartitionPolicy,
    sensor: PointerSensor,
    state: DragState,
    next_session: u64,
    observers: Vec<Box<dyn DragObserver>>,
}

impl DragEngine {
    pub fn new(policy: PartitionPolicy, activation_distance: u16) -> Self {
        Self {
            policy,
            sensor: PointerSensor::new(activation_distance),
            state: DragState::Idle,
            next_session: 1,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn DragObserver>) {
        self.observers.push(observer);
    }

    #[cfg(test)]
    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Wheel events belong to the list for as long as a drag is live
    pub fn intercepts_wheel(&self) -> bool {
        self.is_dragging()
    }

    pub fn active_session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            _ => None,
        }
    }

    /// Item being dragged, if any
    pub fn active_item(&self) -> Option<ItemId> {
        self.active_session().map(|session| session.active_id)
    }

    pub fn pointer_down(
        &mut self,
        column: u16,
        row: u16,
        hits: &HitMap,
        slots: &[SlotRect],
        items: &[Item],
    ) -> DragOutcome {
        if self.is_dragging() {
            return DragOutcome::Ignored;
        }
        self.state = DragState::Idle;
        if !self.sensor.press(column, row, hits) {
            return DragOutcome::Ignored;
        }
        let slot_index = hits
            .target_at(column, row)
            .and_then(|target| hits.row_slot(target));
        let slot = slot_index.and_then(|index| slots.iter().find(|slot| slot.index == index));
        let (Some(slot), Some(item)) = (slot, slot_index.and_then(|index| items.get(index))) else {
            self.sensor.reset();
            return DragOutcome::Ignored;
        };

        self.state = DragState::Pressed {
            slot: slot.index,
            id: item.id,
            is_pinned: item.is_pinned,
            label: item.preview.lines().next().unwrap_or_default().to_string(),
            grab_offset: row.saturating_sub(slot.rect.y),
        };
        DragOutcome::Armed
    }

    pub fn pointer_move(
        &mut self,
        column: u16,
        row: u16,
        slots: &[SlotRect],
        list_area: Rect,
    ) -> DragOutcome {
        match &mut self.state {
            DragState::Idle => DragOutcome::Ignored,
            DragState::Pressed {
                slot,
                id,
                is_pinned,
                label,
                grab_offset,
            } => {
                if !self.sensor.movement(column, row) {
                    return DragOutcome::Ignored;
                }
                let session = DragSession {
                    session_id: self.next_session,
                    active_id: *id,
                    active_pinned: *is_pinned,
                    origin_slot: *slot,
                    over_slot: None,
                    overlay: DragOverlay {
                        id: *id,
                        label: std::mem::take(label),
                        is_pinned: *is_pinned,
                        column,
                        row,
                        grab_offset: *grab_offset,
                    },
                };
                self.next_session += 1;
                let session_id = session.session_id;
                self.state = DragState::Dragging(session);
                self.update_over(column, row, slots, list_area);
                if let DragState::Dragging(session) = &self.state {
                    for observer in &mut self.observers {
                        observer.on_drag_start(session);
                    }
                }
                DragOutcome::Started(session_id)
            }
            DragState::Dragging(_) => {
                self.update_over(column, row, slots, list_area);
                DragOutcome::Moved
            }
        }
    }

    pub fn pointer_up(
        &mut self,
        column: u16,
        row: u16,
        slots: &[SlotRect],
        list_area: Rect,
    ) -> DragOutcome {
        self.sensor.reset();
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Idle => DragOutcome::Ignored,
            DragState::Pressed { slot, .. } => DragOutcome::Clicked(slot),
            DragState::Dragging(mut session) => {
                session.over_slot = self.resolve_target(&session, column, row, slots, list_area);
                let target = session
                    .over_slot
                    .and_then(|index| slots.iter().find(|slot| slot.index == index));
                match target {
                    None => self.finish_cancelled(session, CancelReason::NoTarget),
                    Some(target) if target.index == session.origin_slot => {
                        self.finish_cancelled(session, CancelReason::SameSlot)
                    }
                    Some(target) => {
                        let intent = ReorderIntent {
                            from: session.active_id,
                            to: target.id,
                            toggle_pin_first: target.is_pinned != session.active_pinned,
                        };
                        for observer in &mut self.observers {
                            observer.on_drag_end(&session, &intent);
                        }
                        DragOutcome::Dropped(intent)
                    }
                }
            }
        }
    }

    /// Abort whatever is in progress. Only a live drag reports a cancel.
    pub fn cancel(&mut self, reason: CancelReason) -> DragOutcome {
        self.sensor.reset();
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging(session) => self.finish_cancelled(session, reason),
            _ => DragOutcome::Ignored,
        }
    }

    /// Move the active item one step through the same target resolution a
    /// pointer drop uses.
    pub fn keyboard_move(
        &self,
        items: &[Item],
        active_index: Option<usize>,
        direction: Direction,
    ) -> Option<ReorderIntent> {
        let index = active_index?;
        let active = items.get(index)?;
        let target_index = match direction {
            Direction::Up => index.checked_sub(1)?,
            Direction::Down => index + 1,
        };
        let target = items.get(target_index)?;
        if !self.policy.accepts(active.is_pinned, target.is_pinned) {
            return None;
        }
        Some(ReorderIntent {
            from: active.id,
            to: target.id,
            toggle_pin_first: active.is_pinned != target.is_pinned,
        })
    }

    fn finish_cancelled(&mut self, session: DragSession, reason: CancelReason) -> DragOutcome {
        for observer in &mut self.observers {
            observer.on_drag_cancel(&session, reason);
        }
        DragOutcome::Cancelled(reason)
    }

    fn update_over(&mut self, column: u16, row: u16, slots: &[SlotRect], list_area: Rect) {
        let over = match &self.state {
            DragState::Dragging(session) => {
                self.resolve_target(session, column, row, slots, list_area)
            }
            _ => return,
        };
        if let DragState::Dragging(session) = &mut self.state {
            session.over_slot = over;
            session.overlay.column = column;
            session.overlay.row = row;
        }
    }

    /// Slot containing the pointer row, else the nearest slot center.
    /// Nothing when the pointer is outside the list.
    fn resolve_target(
        &self,
        session: &DragSession,
        column: u16,
        row: u16,
        slots: &[SlotRect],
        list_area: Rect,
    ) -> Option<usize> {
        if !list_area.contains(Position::new(column, row)) {
            return None;
        }
        let mut nearest: Option<&SlotRect> = None;
        for slot in slots
            .iter()
            .filter(|slot| self.policy.accepts(session.active_pinned, slot.is_pinned))
        {
            if slot.contains_row(row) {
                return Some(slot.index);
            }
            if nearest.is_none_or(|best| slot.center_distance(row) < best.center_distance(row)) {
                nearest = Some(slot);
            }
        }
        nearest.map(|slot| slot.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::test_item;
    use crate::drag::sensor::RegionRole;
    use std::sync::{Arc, Mutex};

    const AREA: Rect = Rect {
        x: 0,
        y: 0,
        width: 40,
        height: 20,
    };

    /// Items 1, 2 pinned and 3, 4, 5 unpinned, one row each starting at y=0
    fn fixture() -> (Vec<Item>, Vec<SlotRect>, HitMap) {
        let items: Vec<Item> = (1..=5).map(|id| test_item(id, id <= 2)).collect();
        let mut hits = HitMap::default();
        let list = hits.push(None, AREA, RegionRole::Container);
        let slots: Vec<SlotRect> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let rect = Rect::new(0, index as u16 * 2, 40, 2);
                let row = hits.push(Some(list), rect, RegionRole::ListRow(index));
                hits.push(Some(row), Rect::new(36, rect.y, 3, 1), RegionRole::ActionButton);
                SlotRect {
                    index,
                    id: item.id,
                    is_pinned: item.is_pinned,
                    rect,
                }
            })
            .collect();
        (items, slots, hits)
    }

    fn drag(
        engine: &mut DragEngine,
        from_row: u16,
        to_row: u16,
        fixture: &(Vec<Item>, Vec<SlotRect>, HitMap),
    ) -> DragOutcome {
        let (items, slots, hits) = fixture;
        assert_eq!(
            engine.pointer_down(5, from_row, hits, slots, items),
            DragOutcome::Armed
        );
        engine.pointer_move(5, to_row, slots, AREA);
        engine.pointer_up(5, to_row, slots, AREA)
    }

    #[test]
    fn test_drag_within_pinned() {
        let fixture = fixture();
        for policy in [PartitionPolicy::Strict, PartitionPolicy::AutoToggle] {
            let mut engine = DragEngine::new(policy, 2);
            let outcome = drag(&mut engine, 2, 0, &fixture);
            assert_eq!(
                outcome,
                DragOutcome::Dropped(ReorderIntent {
                    from: ItemId(2),
                    to: ItemId(1),
                    toggle_pin_first: false,
                })
            );
            assert_eq!(engine.state(), &DragState::Idle);
        }
    }

    #[test]
    fn test_drag_within_unpinned() {
        let fixture = fixture();
        for policy in [PartitionPolicy::Strict, PartitionPolicy::AutoToggle] {
            let mut engine = DragEngine::new(policy, 2);
            let outcome = drag(&mut engine, 4, 9, &fixture);
            assert_eq!(
                outcome,
                DragOutcome::Dropped(ReorderIntent {
                    from: ItemId(3),
                    to: ItemId(5),
                    toggle_pin_first: false,
                })
            );
        }
    }

    #[test]
    fn test_drag_across_boundary_auto_toggle() {
        let fixture = fixture();
        let mut engine = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        // Last unpinned row onto the second pinned row
        let outcome = drag(&mut engine, 8, 2, &fixture);
        assert_eq!(
            outcome,
            DragOutcome::Dropped(ReorderIntent {
                from: ItemId(5),
                to: ItemId(2),
                toggle_pin_first: true,
            })
        );
    }

    #[test]
    fn test_drag_across_boundary_strict_snaps_to_own_partition() {
        let fixture = fixture();
        let mut engine = DragEngine::new(PartitionPolicy::Strict, 2);
        // Pinned targets are filtered out; the nearest unpinned slot wins
        let outcome = drag(&mut engine, 8, 2, &fixture);
        assert_eq!(
            outcome,
            DragOutcome::Dropped(ReorderIntent {
                from: ItemId(5),
                to: ItemId(3),
                toggle_pin_first: false,
            })
        );

        // Top unpinned row dragged upward has nowhere to go but itself
        let outcome = drag(&mut engine, 4, 0, &fixture);
        assert_eq!(outcome, DragOutcome::Cancelled(CancelReason::SameSlot));
    }

    #[test]
    fn test_release_outside_list_cancels() {
        let fixture = fixture();
        let (items, slots, hits) = &fixture;
        let mut engine = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        engine.pointer_down(5, 4, hits, slots, items);
        engine.pointer_move(5, 8, slots, AREA);
        let outcome = engine.pointer_up(60, 8, slots, AREA);
        assert_eq!(outcome, DragOutcome::Cancelled(CancelReason::NoTarget));
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_escape_cancels_session() {
        let fixture = fixture();
        let (items, slots, hits) = &fixture;
        let mut engine = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        engine.pointer_down(5, 4, hits, slots, items);
        assert!(matches!(
            engine.pointer_move(5, 8, slots, AREA),
            DragOutcome::Started(_)
        ));
        assert_eq!(engine.active_item(), Some(ItemId(3)));
        assert_eq!(engine.active_session().unwrap().over_slot, Some(4));

        assert_eq!(
            engine.cancel(CancelReason::Escape),
            DragOutcome::Cancelled(CancelReason::Escape)
        );
        assert_eq!(engine.active_session(), None);
        // Release after cancel is a no-op
        assert_eq!(engine.pointer_up(5, 8, slots, AREA), DragOutcome::Ignored);
    }

    #[test]
    fn test_exempt_press_never_drags() {
        let fixture = fixture();
        let (items, slots, hits) = &fixture;
        let mut engine = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        assert_eq!(
            engine.pointer_down(37, 4, hits, slots, items),
            DragOutcome::Ignored
        );
        assert_eq!(engine.pointer_move(37, 9, slots, AREA), DragOutcome::Ignored);
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_small_movement_is_a_click() {
        let fixture = fixture();
        let (items, slots, hits) = &fixture;
        let mut engine = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        engine.pointer_down(5, 4, hits, slots, items);
        assert_eq!(engine.pointer_move(6, 5, slots, AREA), DragOutcome::Ignored);
        assert_eq!(engine.pointer_up(6, 5, slots, AREA), DragOutcome::Clicked(2));
    }

    #[test]
    fn test_wheel_interception_tracks_session() {
        let fixture = fixture();
        let (items, slots, hits) = &fixture;
        let mut engine = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        assert!(!engine.intercepts_wheel());
        engine.pointer_down(5, 4, hits, slots, items);
        assert!(!engine.intercepts_wheel());
        engine.pointer_move(5, 8, slots, AREA);
        assert!(engine.intercepts_wheel());
        engine.pointer_up(5, 8, slots, AREA);
        assert!(!engine.intercepts_wheel());

        engine.pointer_down(5, 4, hits, slots, items);
        engine.pointer_move(5, 8, slots, AREA);
        engine.cancel(CancelReason::Escape);
        assert!(!engine.intercepts_wheel());
    }

    #[test]
    fn test_overlay_follows_pointer() {
        let fixture = fixture();
        let (items, slots, hits) = &fixture;
        let mut engine = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        engine.pointer_down(5, 5, hits, slots, items);
        engine.pointer_move(5, 9, slots, AREA);
        let overlay = &engine.active_session().unwrap().overlay;
        assert_eq!(overlay.label, "entry 3");
        assert_eq!(overlay.top(), 8);
        engine.pointer_move(7, 12, slots, AREA);
        assert_eq!(engine.active_session().unwrap().overlay.row, 12);
    }

    #[test]
    fn test_keyboard_move_uses_policy() {
        let (items, _, _) = fixture();
        let auto = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        let strict = DragEngine::new(PartitionPolicy::Strict, 2);

        assert_eq!(
            auto.keyboard_move(&items, Some(3), Direction::Up),
            Some(ReorderIntent {
                from: ItemId(4),
                to: ItemId(3),
                toggle_pin_first: false,
            })
        );
        assert_eq!(
            auto.keyboard_move(&items, Some(2), Direction::Up),
            Some(ReorderIntent {
                from: ItemId(3),
                to: ItemId(2),
                toggle_pin_first: true,
            })
        );
        assert_eq!(strict.keyboard_move(&items, Some(2), Direction::Up), None);
        assert_eq!(auto.keyboard_move(&items, Some(0), Direction::Up), None);
        assert_eq!(auto.keyboard_move(&items, Some(4), Direction::Down), None);
        assert_eq!(auto.keyboard_move(&items, None, Direction::Down), None);
    }

    #[derive(Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl DragObserver for Recorder {
        fn on_drag_start(&mut self, session: &DragSession) {
            self.events.lock().unwrap().push(format!("start {}", session.active_id));
        }
        fn on_drag_end(&mut self, _session: &DragSession, intent: &ReorderIntent) {
            self.events.lock().unwrap().push(format!("end {}", intent.to));
        }
        fn on_drag_cancel(&mut self, _session: &DragSession, reason: CancelReason) {
            self.events.lock().unwrap().push(format!("cancel {:?}", reason));
        }
    }

    #[test]
    fn test_observers_see_every_transition() {
        let fixture = fixture();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut engine = DragEngine::new(PartitionPolicy::AutoToggle, 2);
        engine.add_observer(Box::new(Recorder {
            events: events.clone(),
        }));
        drag(&mut engine, 4, 8, &fixture);
        drag(&mut engine, 4, 4, &fixture);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["start 3", "end 5"]
        );

        let (items, slots, hits) = &fixture;
        engine.pointer_down(5, 4, hits, slots, items);
        engine.pointer_move(5, 6, slots, AREA);
        engine.pointer_up(5, 5, slots, AREA);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["start 3", "end 5", "start 3", "cancel SameSlot"]
        );
    }
}
