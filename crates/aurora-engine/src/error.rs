use thiserror::Error;

use crate::shader::ShaderStage;

/// Failures surfaced by the rendering core.
///
/// Only `ContextUnavailable` is fatal to the subsystem; shader failures are
/// reported as values and the previously linked program keeps drawing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A shader stage failed to parse or validate.
    #[error("{stage} stage failed to compile:\n{diagnostic}")]
    Compile {
        stage: ShaderStage,
        diagnostic: String,
    },

    /// Compiled stages could not be combined into a usable program.
    #[error("shader program failed to link: {0}")]
    Link(String),

    /// No GPU context could be acquired for the drawable surface.
    #[error("GPU context unavailable: {0}")]
    ContextUnavailable(String),

    /// A frame was requested against a missing, unlinked or released program.
    #[error("stale GPU resource: {0}")]
    StaleResourceAccess(&'static str),

    /// `initialize` was called on an engine that already owns a context.
    #[error("render engine is already initialized")]
    AlreadyInitialized,

    /// The presentation surface failed in a way that cannot be recovered.
    #[error("presentation surface lost")]
    SurfaceLost,
}
