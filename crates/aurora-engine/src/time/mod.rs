//! Animation clock.
//!
//! Produces the monotonically increasing frame timestamps the scheduler feeds
//! into the renderer. One `FrameClock` per window.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
