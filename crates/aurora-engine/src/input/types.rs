use crate::coords::Vec2;

/// Identifies one pointer for the lifetime of a press.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PointerId {
    Mouse,
    Touch(u64),
}

/// Platform-agnostic pointer event in surface-local logical units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PointerEvent {
    Down { id: PointerId, x: f32, y: f32 },

    /// `dx`/`dy` is the movement reported by the platform since the previous
    /// event for this pointer.
    Move { id: PointerId, x: f32, y: f32, dx: f32, dy: f32 },

    Up { id: PointerId },

    /// Pointer left the surface (or the touch was cancelled).
    Leave { id: PointerId },
}

/// What happens to the movement accumulator once a frame consumed it.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum MovementPolicy {
    /// Zero the accumulator after every drawn frame; shaders see per-frame motion.
    #[default]
    ResetPerFrame,

    /// Keep summing for the whole session.
    Accumulate,
}

/// Copy of the tracker queries taken once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerSnapshot {
    /// Primary pointer, or the last released position when none is down.
    pub first: Vec2,
    pub count: usize,

    /// `[x0, y0, x1, y1, ...]`; `[0, 0]` when no pointer is down.
    pub positions: Vec<f32>,
    pub movement: Vec2,
}

impl Default for PointerSnapshot {
    fn default() -> Self {
        Self {
            first: Vec2::ZERO,
            count: 0,
            positions: vec![0.0, 0.0],
            movement: Vec2::ZERO,
        }
    }
}
