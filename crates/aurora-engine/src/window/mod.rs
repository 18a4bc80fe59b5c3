//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window and drives a `HeroLoop` from redraw
//! requests.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
