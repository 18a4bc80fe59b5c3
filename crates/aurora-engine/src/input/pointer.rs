use crate::coords::{SurfaceState, Vec2};

use super::types::{PointerEvent, PointerId, PointerSnapshot};

/// Aggregates pointer events into GPU pixel space.
///
/// Positions live in an owned table kept in arrival order, so the primary
/// pointer is the earliest one still down. Entries are only ever removed by
/// `up`/`leave` handlers.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    surface: SurfaceState,
    pointers: Vec<(PointerId, Vec2)>,
    active: bool,

    /// Last position of the final pointer released.
    fallback: Vec2,
    movement: Vec2,
}

impl PointerTracker {
    pub fn new(surface: SurfaceState) -> Self {
        Self {
            surface,
            pointers: Vec::new(),
            active: false,
            fallback: Vec2::ZERO,
            movement: Vec2::ZERO,
        }
    }

    /// Must be called on every resize or device pixel ratio change; positions
    /// reported afterwards are mapped with the new scale and height.
    pub fn update_scale(&mut self, surface: SurfaceState) {
        self.surface = surface;
    }

    pub fn surface(&self) -> SurfaceState {
        self.surface
    }

    /// Maps a surface-local position into GPU pixel space (bottom-left origin).
    pub fn map(&self, x: f32, y: f32) -> Vec2 {
        let scale = self.surface.scale();
        Vec2::new(x * scale, self.surface.physical_height() - y * scale)
    }

    pub fn apply(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down { id, x, y } => self.on_pointer_down(id, x, y),
            PointerEvent::Move { id, x, y, dx, dy } => self.on_pointer_move(id, x, y, dx, dy),
            PointerEvent::Up { id } => self.on_pointer_up(id),
            PointerEvent::Leave { id } => self.on_pointer_leave(id),
        }
    }

    pub fn on_pointer_down(&mut self, id: PointerId, x: f32, y: f32) {
        let pos = self.map(x, y);
        self.active = true;

        match self.slot_mut(id) {
            Some(slot) => *slot = pos,
            None => self.pointers.push((id, pos)),
        }
    }

    /// Ignored unless a pointer is down. Moves from pointers that are not in
    /// the table (a hovering mouse during a touch) are dropped as well.
    pub fn on_pointer_move(&mut self, id: PointerId, x: f32, y: f32, dx: f32, dy: f32) {
        if !self.active {
            return;
        }
        let pos = self.map(x, y);
        let scale = self.surface.scale();

        let Some(slot) = self.slot_mut(id) else { return };
        *slot = pos;

        // The reported delta, flipped into GPU space like positions are.
        self.movement += Vec2::new(dx * scale, -dy * scale);
    }

    pub fn on_pointer_up(&mut self, id: PointerId) {
        self.release(id);
    }

    pub fn on_pointer_leave(&mut self, id: PointerId) {
        self.release(id);
    }

    fn release(&mut self, id: PointerId) {
        if let Some(index) = self.pointers.iter().position(|(p, _)| *p == id) {
            if self.pointers.len() == 1 {
                self.fallback = self.pointers[index].1;
            }
            self.pointers.remove(index);
        }

        if self.pointers.is_empty() {
            self.active = false;
        }
    }

    fn slot_mut(&mut self, id: PointerId) -> Option<&mut Vec2> {
        self.pointers
            .iter_mut()
            .find(|(p, _)| *p == id)
            .map(|(_, pos)| pos)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn count(&self) -> usize {
        self.pointers.len()
    }

    /// Primary pointer position, or the persisted fallback when none is down.
    pub fn first(&self) -> Vec2 {
        self.pointers.first().map_or(self.fallback, |(_, pos)| *pos)
    }

    /// Flattened positions of all active pointers, `[0, 0]` when none.
    pub fn positions(&self) -> Vec<f32> {
        if self.pointers.is_empty() {
            return vec![0.0, 0.0];
        }
        self.pointers
            .iter()
            .flat_map(|(_, pos)| pos.to_array())
            .collect()
    }

    pub fn movement(&self) -> Vec2 {
        self.movement
    }

    /// Zeroes the movement accumulator once a frame has consumed it.
    pub fn consume_movement(&mut self) {
        self.movement = Vec2::ZERO;
    }

    pub fn snapshot(&self) -> PointerSnapshot {
        PointerSnapshot {
            first: self.first(),
            count: self.count(),
            positions: self.positions(),
            movement: self.movement(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tracker(w: f32, h: f32, scale: f32) -> PointerTracker {
        PointerTracker::new(SurfaceState::new(w, h, scale).unwrap())
    }

    #[test]
    fn press_move_release_scenario() {
        let mut t = tracker(800.0, 600.0, 2.0);

        t.on_pointer_down(PointerId::Mouse, 100.0, 100.0);
        assert_eq!(t.first(), Vec2::new(200.0, 1000.0));
        assert_eq!(t.count(), 1);

        t.on_pointer_move(PointerId::Mouse, 110.0, 100.0, 10.0, 0.0);
        assert_eq!(t.movement(), Vec2::new(20.0, 0.0));
        assert_eq!(t.first(), Vec2::new(220.0, 1000.0));

        t.on_pointer_up(PointerId::Mouse);
        assert_eq!(t.count(), 0);
        assert!(!t.is_active());
        assert_eq!(t.first(), Vec2::new(220.0, 1000.0));
    }

    #[test]
    fn moves_are_ignored_while_inactive() {
        let mut t = tracker(800.0, 600.0, 1.0);
        t.on_pointer_move(PointerId::Mouse, 50.0, 50.0, 5.0, 5.0);
        assert_eq!(t.movement(), Vec2::ZERO);
        assert_eq!(t.count(), 0);
        assert_eq!(t.first(), Vec2::ZERO);
    }

    #[test]
    fn movement_uses_reported_delta_not_positions() {
        let mut t = tracker(100.0, 100.0, 1.0);
        t.on_pointer_down(PointerId::Touch(1), 10.0, 10.0);
        // Position jumps by 50 but the platform reports a delta of 3.
        t.on_pointer_move(PointerId::Touch(1), 60.0, 10.0, 3.0, 4.0);
        assert_eq!(t.movement(), Vec2::new(3.0, -4.0));
    }

    #[test]
    fn primary_is_earliest_pointer_still_down() {
        let mut t = tracker(100.0, 100.0, 1.0);
        t.on_pointer_down(PointerId::Touch(7), 10.0, 10.0);
        t.on_pointer_down(PointerId::Touch(3), 20.0, 20.0);
        assert_eq!(t.first(), Vec2::new(10.0, 90.0));

        t.on_pointer_up(PointerId::Touch(7));
        assert_eq!(t.first(), Vec2::new(20.0, 80.0));
        assert_eq!(t.positions(), vec![20.0, 80.0]);
    }

    #[test]
    fn fallback_only_updates_for_the_final_release() {
        let mut t = tracker(100.0, 100.0, 1.0);
        t.on_pointer_down(PointerId::Touch(1), 10.0, 10.0);
        t.on_pointer_down(PointerId::Touch(2), 30.0, 30.0);

        t.on_pointer_leave(PointerId::Touch(1));
        assert!(t.is_active());

        t.on_pointer_up(PointerId::Touch(2));
        assert!(!t.is_active());
        assert_eq!(t.first(), Vec2::new(30.0, 70.0));
    }

    #[test]
    fn positions_sentinel_when_idle() {
        let t = tracker(100.0, 100.0, 1.0);
        assert_eq!(t.positions(), vec![0.0, 0.0]);
    }

    #[test]
    fn duplicate_down_keeps_keys_unique() {
        let mut t = tracker(100.0, 100.0, 1.0);
        t.on_pointer_down(PointerId::Mouse, 1.0, 1.0);
        t.on_pointer_down(PointerId::Mouse, 2.0, 2.0);
        assert_eq!(t.count(), 1);
        assert_eq!(t.first(), Vec2::new(2.0, 98.0));
    }

    #[test]
    fn stale_scale_misplaces_pointers() {
        let mut t = tracker(800.0, 600.0, 1.0);
        t.update_scale(SurfaceState::new(800.0, 600.0, 2.0).unwrap());
        t.on_pointer_down(PointerId::Mouse, 100.0, 100.0);
        assert_eq!(t.first(), Vec2::new(200.0, 1000.0));

        let mut stale = tracker(800.0, 600.0, 1.0);
        stale.on_pointer_down(PointerId::Mouse, 100.0, 100.0);
        assert_ne!(stale.first(), t.first());
    }

    #[test]
    fn consume_movement_resets_accumulator() {
        let mut t = tracker(100.0, 100.0, 1.0);
        t.on_pointer_down(PointerId::Mouse, 0.0, 0.0);
        t.on_pointer_move(PointerId::Mouse, 1.0, 0.0, 1.0, 0.0);
        t.consume_movement();
        assert_eq!(t.movement(), Vec2::ZERO);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Down(u64, f32, f32),
        Move(u64, f32, f32),
        Up(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..4, 0f32..800.0, 0f32..600.0).prop_map(|(id, x, y)| Op::Down(id, x, y)),
            (0u64..4, 0f32..800.0, 0f32..600.0).prop_map(|(id, x, y)| Op::Move(id, x, y)),
            (0u64..4).prop_map(Op::Up),
        ]
    }

    proptest! {
        #[test]
        fn releasing_everything_persists_last_position(ops in prop::collection::vec(op(), 0..40)) {
            let mut t = tracker(800.0, 600.0, 2.0);
            let mut last_released: Option<Vec2> = None;

            for op in ops {
                match op {
                    Op::Down(id, x, y) => t.on_pointer_down(PointerId::Touch(id), x, y),
                    Op::Move(id, x, y) => t.on_pointer_move(PointerId::Touch(id), x, y, 1.0, 1.0),
                    Op::Up(id) => {
                        if t.count() == 1 {
                            if let Some(pos) = t.slot_mut(PointerId::Touch(id)).map(|p| *p) {
                                last_released = Some(pos);
                            }
                        }
                        t.on_pointer_up(PointerId::Touch(id));
                    }
                }
            }

            for id in 0..4 {
                if t.count() == 1 {
                    last_released = Some(t.first());
                }
                t.on_pointer_up(PointerId::Touch(id));
            }

            prop_assert_eq!(t.count(), 0);
            prop_assert!(!t.is_active());
            prop_assert_eq!(t.first(), last_released.unwrap_or(Vec2::ZERO));
        }
    }
}
