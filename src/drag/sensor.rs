//! Pointer sensor and hit regions
//!
//! The renderer records every interactive rectangle it draws into a
//! [`HitMap`] each frame. Regions form a tree (rows inside the list, buttons
//! inside rows), and a region may opt out of dragging. The sensor asks the
//! map whether anything between the press target and the root opted out
//! before it arms.

use ratatui::layout::{Position, Rect};

pub type RegionId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRole {
    Container,
    /// A rendered list row; carries the logical index of its item
    ListRow(usize),
    ActionButton,
    Scrollbar,
    Preview,
    Input,
}

impl RegionRole {
    fn exempt_by_default(self) -> bool {
        matches!(
            self,
            RegionRole::ActionButton | RegionRole::Scrollbar | RegionRole::Input
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRegion {
    pub id: RegionId,
    pub parent: Option<RegionId>,
    pub rect: Rect,
    pub role: RegionRole,
    pub drag_exempt: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HitMap {
    regions: Vec<HitRegion>,
}

impl HitMap {
    /// Add a region. Children must be pushed after their parent.
    pub fn push(&mut self, parent: Option<RegionId>, rect: Rect, role: RegionRole) -> RegionId {
        let id = self.regions.len();
        self.regions.push(HitRegion {
            id,
            parent,
            rect,
            role,
            drag_exempt: role.exempt_by_default(),
        });
        id
    }

    #[cfg(test)]
    pub fn set_drag_exempt(&mut self, id: RegionId, exempt: bool) {
        if let Some(region) = self.regions.get_mut(id) {
            region.drag_exempt = exempt;
        }
    }

    pub fn get(&self, id: RegionId) -> Option<&HitRegion> {
        self.regions.get(id)
    }

    /// Innermost region under the point (last pushed wins)
    pub fn target_at(&self, column: u16, row: u16) -> Option<RegionId> {
        let point = Position::new(column, row);
        self.regions
            .iter()
            .rev()
            .find(|region| region.rect.contains(point))
            .map(|region| region.id)
    }

    /// True if the region or any of its ancestors opted out of dragging
    pub fn is_drag_exempt(&self, id: RegionId) -> bool {
        self.ancestors(id).any(|region| region.drag_exempt)
    }

    /// Logical item index of the row containing the region, if any
    pub fn row_slot(&self, id: RegionId) -> Option<usize> {
        self.ancestors(id).find_map(|region| match region.role {
            RegionRole::ListRow(index) => Some(index),
            _ => None,
        })
    }

    fn ancestors(&self, id: RegionId) -> impl Iterator<Item = &HitRegion> {
        let mut next = self.regions.get(id);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent.and_then(|parent| self.regions.get(parent));
            Some(current)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Press {
    column: u16,
    row: u16,
}

/// Arms on press over a draggable target and fires once the pointer has
/// travelled `activation_distance` cells.
#[derive(Debug, Clone)]
pub struct PointerSensor {
    activation_distance: u16,
    press: Option<Press>,
    activated: bool,
}

impl PointerSensor {
    pub fn new(activation_distance: u16) -> Self {
        Self {
            activation_distance: activation_distance.max(1),
            press: None,
            activated: false,
        }
    }

    #[cfg(test)]
    pub fn activation_distance(&self) -> u16 {
        self.activation_distance
    }

    /// Returns whether the sensor armed
    pub fn press(&mut self, column: u16, row: u16, hits: &HitMap) -> bool {
        self.reset();
        let Some(target) = hits.target_at(column, row) else {
            return false;
        };
        if hits.is_drag_exempt(target) {
            return false;
        }
        self.press = Some(Press { column, row });
        true
    }

    /// Returns true exactly once, on the movement that crosses the threshold
    pub fn movement(&mut self, column: u16, row: u16) -> bool {
        let Some(press) = self.press else {
            return false;
        };
        if self.activated {
            return false;
        }
        let distance = press.column.abs_diff(column).max(press.row.abs_diff(row));
        if distance >= self.activation_distance {
            self.activated = true;
            return true;
        }
        false
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.press.is_some()
    }

    pub fn reset(&mut self) {
        self.press = None;
        self.activated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_with_button() -> (HitMap, RegionId, RegionId) {
        let mut hits = HitMap::default();
        let list = hits.push(None, Rect::new(0, 0, 40, 10), RegionRole::Container);
        let row = hits.push(Some(list), Rect::new(0, 2, 40, 2), RegionRole::ListRow(1));
        let button = hits.push(Some(row), Rect::new(36, 2, 3, 1), RegionRole::ActionButton);
        (hits, row, button)
    }

    #[test]
    fn test_target_prefers_innermost() {
        let (hits, row, button) = list_with_button();
        assert_eq!(hits.target_at(37, 2), Some(button));
        assert_eq!(hits.target_at(5, 3), Some(row));
        assert_eq!(hits.target_at(50, 3), None);
    }

    #[test]
    fn test_exemption_walks_ancestors() {
        let (mut hits, row, button) = list_with_button();
        assert!(hits.is_drag_exempt(button));
        assert!(!hits.is_drag_exempt(row));

        // A plain child of an exempt region inherits the exemption
        let icon = hits.push(Some(button), Rect::new(37, 2, 1, 1), RegionRole::Preview);
        assert!(hits.is_drag_exempt(icon));
        assert_eq!(hits.row_slot(icon), Some(1));

        hits.set_drag_exempt(button, false);
        assert!(!hits.is_drag_exempt(icon));
    }

    #[test]
    fn test_sensor_ignores_exempt_press() {
        let (hits, _, _) = list_with_button();
        let mut sensor = PointerSensor::new(2);
        assert!(!sensor.press(37, 2, &hits));
        assert!(!sensor.movement(37, 8));
    }

    #[test]
    fn test_sensor_activation_threshold() {
        let (hits, _, _) = list_with_button();
        let mut sensor = PointerSensor::new(2);
        assert!(sensor.press(5, 2, &hits));
        assert!(!sensor.movement(6, 3));
        assert!(sensor.movement(5, 4));
        // Fires once per press
        assert!(!sensor.movement(5, 6));
        sensor.reset();
        assert!(!sensor.is_armed());
    }

    #[test]
    fn test_zero_distance_clamped_to_one() {
        let sensor = PointerSensor::new(0);
        assert_eq!(sensor.activation_distance(), 1);
    }
}
