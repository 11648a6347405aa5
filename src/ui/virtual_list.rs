//! Virtualized list layout
//!
//! Only the rows around the viewport are laid out each frame. Scrolling is
//! tracked as "which item is at the top, and how many of its rows are
//! hidden", so every scroll request is expressed in item indices and
//! resolved against row heights at layout time. Heights start out as an
//! estimate derived from `max_preview_lines` and are replaced by measured
//! values once a row has been drawn.

use crate::core::item::{pinned_count, Item, ItemId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Range;
use std::time::{Duration, Instant};

/// Header line plus up to `max_preview_lines` of preview
pub fn estimate_row_height(max_preview_lines: usize) -> u16 {
    1 + max_preview_lines.clamp(1, 32) as u16
}

/// Real height of a fully rendered row
pub fn rendered_row_height(item: &Item, max_preview_lines: usize) -> u16 {
    1 + item.preview_line_count().min(max_preview_lines.clamp(1, 32)) as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
    /// Scroll as little as possible to bring the row into view
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    /// Row relative to the viewport top; negative for overscan above
    pub top: i32,
    /// Content rows, separator excluded
    pub height: u16,
    /// A pinned/unpinned separator line sits directly above the content
    pub separator_above: bool,
}

impl Slot {
    pub fn content_top(&self) -> i32 {
        self.top + i32::from(self.separator_above)
    }

    pub fn bottom(&self) -> i32 {
        self.content_top() + i32::from(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Items laid out this frame, overscan included
    pub range: Range<usize>,
    pub slots: Vec<Slot>,
    pub pinned_count: usize,
    /// Draw placeholders instead of full rows
    pub placeholders: bool,
}

/// Scroll velocity with a hysteresis band between entering and leaving
/// fast-scroll mode
#[derive(Debug, Clone)]
pub struct ScrollVelocity {
    enter_rows_per_sec: f32,
    exit_rows_per_sec: f32,
    span: Duration,
    samples: VecDeque<(Instant, u32)>,
    fast: bool,
}

impl ScrollVelocity {
    pub fn new(enter_rows_per_sec: f32, exit_rows_per_sec: f32) -> Self {
        Self {
            enter_rows_per_sec,
            exit_rows_per_sec: exit_rows_per_sec.min(enter_rows_per_sec),
            span: Duration::from_millis(250),
            samples: VecDeque::new(),
            fast: false,
        }
    }

    pub fn record(&mut self, rows: u32, now: Instant) {
        self.samples.push_back((now, rows));
        self.update(now);
    }

    pub fn rows_per_sec(&self) -> f32 {
        let rows: u32 = self.samples.iter().map(|(_, rows)| rows).sum();
        rows as f32 / self.span.as_secs_f32()
    }

    /// Re-evaluate at `now`; returns whether fast mode is on
    pub fn update(&mut self, now: Instant) -> bool {
        while let Some((at, _)) = self.samples.front() {
            if now.saturating_duration_since(*at) > self.span {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        let velocity = self.rows_per_sec();
        if !self.fast && velocity >= self.enter_rows_per_sec {
            self.fast = true;
        } else if self.fast && velocity <= self.exit_rows_per_sec {
            self.fast = false;
        }
        self.fast
    }

    pub fn is_fast(&self) -> bool {
        self.fast
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Index(usize, Align),
    Delta(i32),
}

pub struct VirtualList {
    max_preview_lines: usize,
    overscan: usize,
    estimate: u16,
    measured: HashMap<ItemId, u16>,
    top_index: usize,
    top_offset: u16,
    pending: Vec<Pending>,
    animating: bool,
    last_reset_token: u64,
    velocity: ScrollVelocity,
}

impl VirtualList {
    pub fn new(max_preview_lines: usize, overscan: usize, velocity: ScrollVelocity) -> Self {
        Self {
            max_preview_lines,
            overscan,
            estimate: estimate_row_height(max_preview_lines),
            measured: HashMap::new(),
            top_index: 0,
            top_offset: 0,
            pending: Vec::new(),
            animating: false,
            last_reset_token: 0,
            velocity,
        }
    }

    pub fn max_preview_lines(&self) -> usize {
        self.max_preview_lines
    }

    pub fn top_index(&self) -> usize {
        self.top_index
    }

    #[cfg(test)]
    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Cache the real height of a row that has been drawn
    pub fn measure(&mut self, id: ItemId, height: u16) {
        self.measured.insert(id, height.max(1));
    }

    /// Forget heights of items that are no longer listed
    pub fn retain_measured(&mut self, items: &[Item]) {
        if self.measured.is_empty() {
            return;
        }
        let present: HashSet<ItemId> = items.iter().map(|item| item.id).collect();
        self.measured.retain(|id, _| present.contains(id));
    }

    pub fn scroll_to_index(&mut self, index: usize, align: Align) {
        self.animating = false;
        self.pending.push(Pending::Index(index, align));
    }

    /// Scroll by whole rows; feeds the velocity tracker
    pub fn scroll_by(&mut self, rows: i32, now: Instant) {
        self.animating = false;
        self.velocity.record(rows.unsigned_abs(), now);
        self.pending.push(Pending::Delta(rows));
    }

    pub fn scroll_to_top(&mut self, animated: bool) {
        self.pending.clear();
        if animated && (self.top_index > 0 || self.top_offset > 0) {
            self.animating = true;
        } else {
            self.animating = false;
            self.top_index = 0;
            self.top_offset = 0;
        }
    }

    /// Jump to the top without animation whenever the store's reset token
    /// changes. Returns whether it did.
    pub fn on_reset_token(&mut self, token: u64) -> bool {
        if token == self.last_reset_token {
            return false;
        }
        self.last_reset_token = token;
        self.scroll_to_top(false);
        true
    }

    /// Advance timers: animated scroll steps and velocity decay.
    /// Returns true if a redraw is needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let was_fast = self.velocity.is_fast();
        let fast_changed = self.velocity.update(now) != was_fast;
        if !self.animating {
            return fast_changed;
        }
        self.top_offset = 0;
        if self.top_index == 0 {
            self.animating = false;
        } else {
            self.top_index -= (self.top_index / 3).max(1);
        }
        true
    }

    /// Lay out the rows around the viewport, applying pending scrolls first
    pub fn window(&mut self, items: &[Item], viewport_height: u16) -> Window {
        let pinned = pinned_count(items);
        let heights = Heights {
            list: self,
            items,
            pinned,
        };
        let (mut top_index, mut top_offset) = (self.top_index, self.top_offset);
        for pending in &self.pending {
            (top_index, top_offset) = match *pending {
                Pending::Index(index, align) => {
                    heights.align_to(index, align, viewport_height, top_index, top_offset)
                }
                Pending::Delta(rows) => heights.offset_by(top_index, top_offset, rows),
            };
        }
        let (top_index, top_offset) = heights.clamp(top_index, top_offset, viewport_height);

        let mut slots = Vec::new();
        let start = top_index.saturating_sub(self.overscan);
        let mut y = -i32::from(top_offset);
        for index in (start..top_index).rev() {
            y -= i32::from(heights.total(index));
        }
        let mut end = start;
        let mut after_viewport = 0;
        while end < items.len() && after_viewport <= self.overscan {
            if y >= i32::from(viewport_height) {
                after_viewport += 1;
                if after_viewport > self.overscan {
                    break;
                }
            }
            let separator_above = heights.separator_above(end);
            slots.push(Slot {
                index: end,
                top: y,
                height: heights.content(end),
                separator_above,
            });
            y += i32::from(heights.total(end));
            end += 1;
        }

        self.pending.clear();
        self.top_index = top_index;
        self.top_offset = top_offset;
        Window {
            range: start..end,
            slots,
            pinned_count: pinned,
            placeholders: self.velocity.is_fast(),
        }
    }
}

/// Row height lookup for one layout pass
struct Heights<'a> {
    list: &'a VirtualList,
    items: &'a [Item],
    pinned: usize,
}

impl Heights<'_> {
    fn separator_above(&self, index: usize) -> bool {
        self.pinned > 0 && self.pinned < self.items.len() && index == self.pinned
    }

    fn content(&self, index: usize) -> u16 {
        self.items
            .get(index)
            .and_then(|item| self.list.measured.get(&item.id).copied())
            .unwrap_or(self.list.estimate)
    }

    fn total(&self, index: usize) -> u16 {
        self.content(index) + u16::from(self.separator_above(index))
    }

    fn align_to(
        &self,
        index: usize,
        align: Align,
        viewport: u16,
        top_index: usize,
        top_offset: u16,
    ) -> (usize, u16) {
        if self.items.is_empty() {
            return (0, 0);
        }
        let index = index.min(self.items.len() - 1);
        match align {
            Align::Start => (index, 0),
            Align::End => self.bottom_aligned(index, viewport),
            Align::Center => {
                let before = viewport.saturating_sub(self.total(index)) / 2;
                self.with_rows_above(index, before)
            }
            Align::Auto => {
                if index < top_index || (index == top_index && top_offset > 0) {
                    return (index, 0);
                }
                let mut bottom = -i32::from(top_offset);
                for i in top_index..=index {
                    bottom += i32::from(self.total(i));
                }
                if bottom > i32::from(viewport) {
                    self.bottom_aligned(index, viewport)
                } else {
                    (top_index, top_offset)
                }
            }
        }
    }

    /// Top position that puts the bottom of `index` on the viewport bottom
    fn bottom_aligned(&self, index: usize, viewport: u16) -> (usize, u16) {
        let own = self.total(index);
        if own >= viewport {
            return (index, 0);
        }
        self.with_rows_above(index, viewport - own)
    }

    /// Top position leaving `rows` rows visible above `index`
    fn with_rows_above(&self, index: usize, rows: u16) -> (usize, u16) {
        let mut remaining = rows;
        let mut top = index;
        while top > 0 && remaining > 0 {
            let height = self.total(top - 1);
            top -= 1;
            if height >= remaining {
                return (top, height - remaining);
            }
            remaining -= height;
        }
        (top, 0)
    }

    fn offset_by(&self, top_index: usize, top_offset: u16, rows: i32) -> (usize, u16) {
        if self.items.is_empty() {
            return (0, 0);
        }
        let mut index = top_index.min(self.items.len() - 1);
        let mut offset = i64::from(top_offset) + i64::from(rows);
        while offset < 0 && index > 0 {
            index -= 1;
            offset += i64::from(self.total(index));
        }
        while offset > 0 && index + 1 < self.items.len() {
            let height = i64::from(self.total(index));
            if offset < height {
                break;
            }
            offset -= height;
            index += 1;
        }
        (index, offset.clamp(0, i64::from(u16::MAX)) as u16)
    }

    /// Keep the list from scrolling past its last row
    fn clamp(&self, top_index: usize, top_offset: u16, viewport: u16) -> (usize, u16) {
        if self.items.is_empty() {
            return (0, 0);
        }
        let last = self.items.len() - 1;
        let (max_index, max_offset) = self.bottom_aligned(last, viewport);
        let current = (top_index.min(last), top_offset);
        if current > (max_index, max_offset) {
            (max_index, max_offset)
        } else {
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::test_item;

    fn items(count: u64, pinned: u64) -> Vec<Item> {
        (1..=count).map(|id| test_item(id, id <= pinned)).collect()
    }

    fn list() -> VirtualList {
        // Estimated row height 3 (header + 2 preview lines)
        VirtualList::new(2, 2, ScrollVelocity::new(200.0, 60.0))
    }

    #[test]
    fn test_estimate_tracks_preview_lines() {
        assert_eq!(estimate_row_height(0), 2);
        assert_eq!(estimate_row_height(3), 4);
        let mut item = test_item(1, false);
        item.preview = "a\nb\nc\nd".into();
        assert_eq!(rendered_row_height(&item, 3), 4);
        item.preview = "one line".into();
        assert_eq!(rendered_row_height(&item, 3), 2);
    }

    #[test]
    fn test_window_renders_viewport_plus_overscan() {
        let items = items(100, 0);
        let mut list = list();
        let window = list.window(&items, 12);
        // 4 visible rows of height 3, plus 2 overscan below
        assert_eq!(window.range, 0..6);
        assert_eq!(window.slots[1].top, 3);

        list.scroll_to_index(50, Align::Start);
        let window = list.window(&items, 12);
        assert_eq!(window.range, 48..56);
        assert_eq!(window.slots[0].top, -6);
        assert_eq!(window.slots[2].index, 50);
        assert_eq!(window.slots[2].top, 0);
    }

    #[test]
    fn test_heights_of_vanished_items_are_forgotten() {
        let all = items(5, 0);
        let mut list = list();
        for item in &all {
            list.measure(item.id, 2);
        }
        list.retain_measured(&all[1..3]);
        let mut kept: Vec<ItemId> = list.measured.keys().copied().collect();
        kept.sort();
        assert_eq!(kept, vec![all[1].id, all[2].id]);

        list.retain_measured(&[]);
        assert!(list.measured.is_empty());
    }

    #[test]
    fn test_separator_after_pinned_items() {
        let items = items(6, 2);
        let mut list = list();
        let window = list.window(&items, 30);
        assert_eq!(window.pinned_count, 2);
        let separators: Vec<usize> = window
            .slots
            .iter()
            .filter(|slot| slot.separator_above)
            .map(|slot| slot.index)
            .collect();
        assert_eq!(separators, vec![2]);
        assert_eq!(window.slots[2].top, 6);
        assert_eq!(window.slots[2].content_top(), 7);
        assert_eq!(window.slots[3].top, 10);

        // No separator when one partition is empty
        let all_pinned = super::tests::items(3, 3);
        let window = list.window(&all_pinned, 30);
        assert!(window.slots.iter().all(|slot| !slot.separator_above));
    }

    #[test]
    fn test_scroll_into_view_below_and_above() {
        let items = items(40, 0);
        let mut list = list();
        list.window(&items, 12);

        // Row 5 is below the viewport: bottom-align it
        list.scroll_to_index(5, Align::Auto);
        list.window(&items, 12);
        assert_eq!(list.top_index(), 2);

        // Row 3 is visible: nothing moves
        list.scroll_to_index(3, Align::Auto);
        list.window(&items, 12);
        assert_eq!(list.top_index(), 2);

        // Row 0 is above: top-align it
        list.scroll_to_index(0, Align::Auto);
        list.window(&items, 12);
        assert_eq!(list.top_index(), 0);
    }

    #[test]
    fn test_measured_heights_replace_estimate() {
        let items = items(10, 0);
        let mut list = list();
        list.measure(items[0].id, 2);
        let window = list.window(&items, 20);
        assert_eq!(window.slots[0].height, 2);
        assert_eq!(window.slots[1].top, 2);
    }

    #[test]
    fn test_scroll_by_clamps_at_both_ends() {
        let items = items(10, 0);
        let now = Instant::now();
        let mut list = list();
        list.scroll_by(-5, now);
        list.window(&items, 9);
        assert_eq!(list.top_index(), 0);

        list.scroll_by(1000, now);
        let window = list.window(&items, 9);
        assert_eq!(list.top_index(), 7);
        let last = window.slots.iter().find(|slot| slot.index == 9).unwrap();
        assert_eq!(last.bottom(), 9);
    }

    #[test]
    fn test_window_survives_list_shrinking() {
        let mut list = list();
        list.scroll_to_index(80, Align::Start);
        list.window(&items(100, 0), 12);
        let window = list.window(&items(3, 0), 12);
        assert_eq!(list.top_index(), 0);
        assert_eq!(window.range, 0..3);
        assert!(list.window(&[], 12).slots.is_empty());
    }

    #[test]
    fn test_reset_token_jumps_to_top() {
        let items = items(50, 0);
        let mut list = list();
        list.scroll_to_index(30, Align::Start);
        list.window(&items, 12);
        assert!(!list.on_reset_token(0));
        assert!(list.on_reset_token(1));
        assert!(!list.is_animating());
        list.window(&items, 12);
        assert_eq!(list.top_index(), 0);
    }

    #[test]
    fn test_animated_scroll_to_top_steps() {
        let items = items(50, 0);
        let now = Instant::now();
        let mut list = list();
        list.scroll_to_index(30, Align::Start);
        list.window(&items, 12);

        list.scroll_to_top(true);
        assert!(list.is_animating());
        let mut steps = 0;
        while list.is_animating() {
            list.tick(now);
            steps += 1;
            assert!(steps < 50);
        }
        assert!(steps > 1);
        assert_eq!(list.top_index(), 0);
    }

    #[test]
    fn test_velocity_hysteresis() {
        let start = Instant::now();
        let mut velocity = ScrollVelocity::new(200.0, 60.0);
        // 30 rows in one burst is 120 rows/s: below the entry threshold
        velocity.record(30, start);
        assert!(!velocity.is_fast());
        velocity.record(30, start + Duration::from_millis(10));
        assert!(velocity.is_fast());

        // Inside the band the mode holds
        let later = start + Duration::from_millis(240);
        velocity.record(0, later);
        assert!(velocity.is_fast());

        // Old samples expire and velocity falls below the exit threshold
        assert!(!velocity.update(start + Duration::from_millis(600)));
    }

    #[test]
    fn test_fast_scroll_switches_to_placeholders() {
        let items = items(500, 0);
        let now = Instant::now();
        let mut list = list();
        for step in 0..5 {
            list.scroll_by(30, now + Duration::from_millis(step * 10));
        }
        let window = list.window(&items, 12);
        assert!(window.placeholders);
        list.tick(now + Duration::from_secs(2));
        assert!(!list.window(&items, 12).placeholders);
    }
}
