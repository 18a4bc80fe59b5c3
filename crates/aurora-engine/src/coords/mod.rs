//! Coordinate types shared by the tracker and the renderer.
//!
//! Two spaces are in play:
//! - surface-local logical units: origin top-left, +Y down (what hosts report)
//! - GPU pixel space: physical pixels, origin bottom-left, +Y up (what shaders see)

mod surface;
mod vec2;

pub use surface::SurfaceState;
pub use vec2::Vec2;
