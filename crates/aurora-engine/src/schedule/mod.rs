//! Frame scheduling.
//!
//! `HeroLoop` sequences setup, per-frame ticks, resizes and teardown over any
//! `FrameRenderer`. Hosts drive it through the `FrameScheduler` trait from
//! whatever per-frame callback they have.

mod hero;
mod renderer;
mod scheduler;

pub use hero::HeroLoop;
pub use renderer::FrameRenderer;
pub use scheduler::{FrameScheduler, TickOutcome};
