//! Pointer input.
//!
//! The public API is platform-agnostic. `PointerTranslator` turns winit window
//! events into `PointerEvent`s; `PointerTracker` aggregates them into the
//! positions and movement the renderer consumes each frame.

mod pointer;
mod types;
mod winit_adapter;

pub use pointer::PointerTracker;
pub use types::{MovementPolicy, PointerEvent, PointerId, PointerSnapshot};
pub use winit_adapter::PointerTranslator;
