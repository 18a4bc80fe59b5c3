//! GPU rendering of the background quad.
//!
//! Convention:
//! - the quad covers NDC `[-1, 1]` on both axes, drawn as a 4-vertex strip
//! - uniforms are in GPU pixel space (physical pixels, bottom-left origin)

mod engine;
mod geometry;
mod uniforms;

pub use engine::{FrameOutcome, RenderEngine, RenderStats, SkipReason};
pub use geometry::{GeometryBuffer, QuadVertex, QUAD_VERTICES, VERTEX_COUNT};
pub use uniforms::{FrameUniforms, ShaderTime};
