//! Aurora engine crate.
//!
//! Drives a single full-screen shaded quad behind a hero section: shader program
//! lifecycle, multi-pointer aggregation in GPU pixel space, and a frame scheduler
//! that ties both to a host animation clock.

pub mod coords;
pub mod device;
pub mod error;
pub mod input;
pub mod logging;
pub mod render;
pub mod schedule;
pub mod shader;
pub mod time;
pub mod window;

pub use error::EngineError;
