//! GPU device and presentation target.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue, binds them to a window
//! surface or to an offscreen texture, and hands out one frame at a time.

mod error;
mod frame;
mod gpu;
mod init;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
