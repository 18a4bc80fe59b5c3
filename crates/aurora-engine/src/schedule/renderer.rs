use crate::coords::SurfaceState;
use crate::error::EngineError;
use crate::input::PointerSnapshot;
use crate::render::{FrameOutcome, RenderEngine};

/// What the scheduler needs from a renderer.
pub trait FrameRenderer {
    /// Validates and installs a fragment source; `Some` carries the diagnostic.
    fn update_shader_source(&mut self, source: &str) -> Option<String>;
    fn update_scale(&mut self, surface: SurfaceState);
    fn render(
        &mut self,
        timestamp_ms: f64,
        pointers: &PointerSnapshot,
    ) -> Result<FrameOutcome, EngineError>;
    /// Releases every GPU handle. Must tolerate repeated calls.
    fn release(&mut self);
}

impl FrameRenderer for RenderEngine<'_> {
    fn update_shader_source(&mut self, source: &str) -> Option<String> {
        RenderEngine::update_shader_source(self, source)
    }

    fn update_scale(&mut self, surface: SurfaceState) {
        RenderEngine::update_scale(self, surface)
    }

    fn render(
        &mut self,
        timestamp_ms: f64,
        pointers: &PointerSnapshot,
    ) -> Result<FrameOutcome, EngineError> {
        RenderEngine::render(self, timestamp_ms, pointers)
    }

    fn release(&mut self) {
        RenderEngine::release(self)
    }
}
