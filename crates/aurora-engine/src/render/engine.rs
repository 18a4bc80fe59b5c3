use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::coords::SurfaceState;
use crate::device::{Gpu, GpuInit, SurfaceErrorAction};
use crate::error::EngineError;
use crate::input::PointerSnapshot;
use crate::shader::{self, ShaderProgram, ShaderStage};

use super::geometry::{GeometryBuffer, VERTEX_COUNT};
use super::uniforms::{FrameUniforms, ShaderTime};

/// Result of one `render` call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    Drawn,
    Skipped(SkipReason),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SkipReason {
    /// Never initialized, or released.
    NoContext,
    /// No linked program.
    NoProgram,
    /// Viewport has zero width or height.
    ZeroArea,
    /// The surface could not hand out a texture this frame.
    SurfaceBusy,
}

/// Counters for diagnostics.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RenderStats {
    pub frames_drawn: u64,
    pub frames_skipped: u64,
    pub programs_linked: u64,
}

/// Owns the GPU context, the shader program and the quad geometry.
///
/// The only component that issues GPU calls. `'w` is the lifetime of the
/// window the surface is bound to (`'static` for headless use).
pub struct RenderEngine<'w> {
    init: GpuInit,
    gpu: Option<Gpu<'w>>,
    geometry: Option<GeometryBuffer>,
    program: ShaderProgram,
    surface: Option<SurfaceState>,
    time: ShaderTime,
    clear_color: wgpu::Color,
    initialized: bool,
    stats: RenderStats,
}

impl<'w> RenderEngine<'w> {
    pub fn new(init: GpuInit) -> Self {
        Self {
            init,
            gpu: None,
            geometry: None,
            program: ShaderProgram::new(),
            surface: None,
            time: ShaderTime::new(),
            clear_color: wgpu::Color::BLACK,
            initialized: false,
            stats: RenderStats::default(),
        }
    }

    /// Color the target is cleared to before the quad is drawn.
    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    /// Acquires a GPU context bound to `window` and sets the viewport to
    /// `logical * scale`. Allowed once per engine.
    pub fn initialize<W>(&mut self, window: &'w W, surface: SurfaceState) -> Result<(), EngineError>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync,
    {
        self.ensure_uninitialized()?;
        let gpu = pollster::block_on(Gpu::for_window(
            window,
            surface.physical_size(),
            self.init.clone(),
        ))?;
        self.install(gpu, surface);
        Ok(())
    }

    /// Like [`initialize`](Self::initialize) but renders into an offscreen
    /// texture.
    pub fn initialize_headless(&mut self, surface: SurfaceState) -> Result<(), EngineError> {
        self.ensure_uninitialized()?;
        let gpu = pollster::block_on(Gpu::headless(surface.physical_size(), self.init.clone()))?;
        self.install(gpu, surface);
        Ok(())
    }

    fn ensure_uninitialized(&self) -> Result<(), EngineError> {
        if self.initialized {
            return Err(EngineError::AlreadyInitialized);
        }
        Ok(())
    }

    fn install(&mut self, gpu: Gpu<'w>, surface: SurfaceState) {
        self.geometry = Some(GeometryBuffer::new(gpu.device()));
        self.gpu = Some(gpu);
        self.surface = Some(surface);
        self.initialized = true;
        log::debug!("render engine initialized, viewport {:?}", surface.physical_size());
    }

    pub fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    /// Compiles one stage of the pending program. Logs and returns `false` on
    /// failure.
    pub fn compile(&mut self, stage: ShaderStage, source: &str) -> bool {
        self.program.compile(stage, source)
    }

    /// Links the compiled stages. A failed link leaves the current program in
    /// place.
    pub fn link(&mut self) -> bool {
        let Some(gpu) = &self.gpu else {
            log::error!("{}", EngineError::StaleResourceAccess("GPU context"));
            return false;
        };
        let ok = self.program.link(gpu.device(), gpu.format());
        self.stats.programs_linked = self.program.link_count();
        ok
    }

    /// Validates a candidate fragment source without touching the live
    /// program. `None` means `update_shader_source` would install it.
    ///
    /// With a context the candidate is also built on the device and dropped,
    /// so device-side rejections are reported too.
    pub fn test_compile(&self, source: &str) -> Option<String> {
        match &self.gpu {
            Some(gpu) => ShaderProgram::check_on_device(gpu.device(), gpu.format(), source)
                .err()
                .map(|err| err.to_string()),
            None => shader::test_compile(source),
        }
    }

    /// Replaces the fragment stage if, and only if, `source` builds.
    ///
    /// Returns the diagnostic on failure; the previous program then keeps
    /// drawing unchanged.
    pub fn update_shader_source(&mut self, source: &str) -> Option<String> {
        let Some(gpu) = &self.gpu else {
            let diagnostic = shader::test_compile(source)
                .unwrap_or_else(|| EngineError::StaleResourceAccess("GPU context").to_string());
            return Some(diagnostic);
        };

        let installed = self.program.install(gpu.device(), gpu.format(), source);
        self.stats.programs_linked = self.program.link_count();
        match installed {
            Ok(()) => {
                log::info!("shader source installed");
                None
            }
            Err(err) => {
                log::warn!("rejected shader source:\n{err}");
                Some(err.to_string())
            }
        }
    }

    /// Applies a new surface size or scale to the viewport and the
    /// presentation target.
    pub fn update_scale(&mut self, surface: SurfaceState) {
        self.surface = Some(surface);
        if let Some(gpu) = &mut self.gpu {
            gpu.resize(surface.physical_size());
        }
        log::debug!("viewport is now {:?} (scale {})", surface.physical_size(), surface.scale());
    }

    /// Viewport in physical pixels.
    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.surface.map(|s| s.physical_size())
    }

    /// Uploads this frame's uniforms and draws the quad.
    ///
    /// Frames without a context, a linked program or a visible viewport are
    /// skipped. Only an unrecoverable surface failure is an error.
    pub fn render(
        &mut self,
        timestamp_ms: f64,
        pointers: &PointerSnapshot,
    ) -> Result<FrameOutcome, EngineError> {
        let time = self.time.advance(timestamp_ms);
        let outcome = self.draw(time, pointers)?;

        match outcome {
            FrameOutcome::Drawn => self.stats.frames_drawn += 1,
            FrameOutcome::Skipped(reason) => {
                log::trace!("frame skipped: {reason:?}");
                self.stats.frames_skipped += 1;
            }
        }
        Ok(outcome)
    }

    fn draw(&mut self, time: f32, pointers: &PointerSnapshot) -> Result<FrameOutcome, EngineError> {
        let (Some(gpu), Some(geometry), Some(surface)) =
            (self.gpu.as_mut(), self.geometry.as_ref(), self.surface)
        else {
            return Ok(FrameOutcome::Skipped(SkipReason::NoContext));
        };
        if !surface.has_area() {
            return Ok(FrameOutcome::Skipped(SkipReason::ZeroArea));
        }
        let Some(program) = self.program.linked_mut() else {
            return Ok(FrameOutcome::Skipped(SkipReason::NoProgram));
        };

        let uniforms = FrameUniforms::new(&surface, time, pointers);
        program.upload(gpu.queue(), &uniforms);

        let mut frame = match gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                return match gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => Err(EngineError::SurfaceLost),
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        Ok(FrameOutcome::Skipped(SkipReason::SurfaceBusy))
                    }
                };
            }
        };

        // The target may lag behind the requested size for a frame.
        let (tw, th) = match &frame.surface_texture {
            Some(st) => (st.texture.width(), st.texture.height()),
            None => gpu.size(),
        };
        let (vw, vh) = surface.physical_size();
        let (vw, vh) = (vw.min(tw), vh.min(th));

        {
            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("aurora background pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_viewport(0.0, 0.0, vw as f32, vh as f32, 0.0, 1.0);
            rpass.set_pipeline(&program.pipeline);
            rpass.set_bind_group(0, &program.bind_group, &[]);
            rpass.set_vertex_buffer(0, geometry.slice());
            rpass.draw(0..VERTEX_COUNT, 0..1);
        }

        gpu.submit(frame);
        Ok(FrameOutcome::Drawn)
    }

    /// Releases the current stages and program. The context stays.
    pub fn reset(&mut self) {
        self.program.reset();
    }

    /// Releases program, geometry and GPU context. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.gpu.is_none() && self.geometry.is_none() && !self.program.is_linked() {
            return;
        }
        self.program.reset();
        self.geometry = None;
        self.gpu = None;
        log::info!("render engine released");
    }

    pub fn is_linked(&self) -> bool {
        self.program.is_linked()
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// Shader time of the most recent frame, in seconds.
    pub fn time(&self) -> f32 {
        self.time.current()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn adapter_info(&self) -> Option<wgpu::AdapterInfo> {
        self.gpu.as_ref().map(Gpu::adapter_info)
    }
}

impl Drop for RenderEngine<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::shader::{DEFAULT_FRAGMENT_SOURCE, VERTEX_SOURCE};

    fn surface(w: f32, h: f32, scale: f32) -> SurfaceState {
        SurfaceState::new(w, h, scale).unwrap()
    }

    /// Headless engine with the default shader, or `None` when the machine
    /// has no usable adapter.
    fn gpu_engine(w: f32, h: f32, scale: f32) -> Option<RenderEngine<'static>> {
        let mut engine = RenderEngine::new(GpuInit::headless());
        match engine.initialize_headless(surface(w, h, scale)) {
            Ok(()) => {}
            Err(EngineError::ContextUnavailable(reason)) => {
                eprintln!("skipping GPU test: {reason}");
                return None;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.update_shader_source(DEFAULT_FRAGMENT_SOURCE), None);
        Some(engine)
    }

    const BROKEN: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return oops; }";

    #[test]
    fn render_before_initialize_is_skipped() {
        let mut engine = RenderEngine::new(GpuInit::default());
        let outcome = engine.render(16.0, &PointerSnapshot::default()).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::NoContext));
        assert_eq!(engine.stats().frames_skipped, 1);
    }

    #[test]
    fn update_without_context_reports_diagnostic() {
        let mut engine = RenderEngine::new(GpuInit::default());
        assert!(engine.update_shader_source(DEFAULT_FRAGMENT_SOURCE).is_some());
        assert!(engine.update_shader_source(BROKEN).is_some());
        assert!(!engine.is_linked());
    }

    #[test]
    fn link_without_context_fails() {
        let mut engine = RenderEngine::new(GpuInit::default());
        assert!(engine.compile(ShaderStage::Vertex, VERTEX_SOURCE));
        assert!(engine.compile(ShaderStage::Fragment, DEFAULT_FRAGMENT_SOURCE));
        assert!(!engine.link());
    }

    #[test]
    fn release_on_fresh_engine_is_a_no_op() {
        let mut engine = RenderEngine::new(GpuInit::default());
        engine.release();
        engine.release();
        assert!(!engine.is_initialized());
    }

    #[test]
    fn time_is_monotonic_across_renders() {
        let mut engine = RenderEngine::new(GpuInit::default());
        let mut prev = 0.0;
        for ts in [0.0, 16.6, 33.3, 20.0, 50.0] {
            engine.render(ts, &PointerSnapshot::default()).unwrap();
            assert!(engine.time() >= prev);
            prev = engine.time();
        }
        assert_eq!(engine.time(), 0.05);
    }

    #[test]
    fn draws_with_default_shader() {
        let Some(mut engine) = gpu_engine(320.0, 240.0, 1.0) else { return };
        assert!(engine.is_linked());

        let outcome = engine.render(16.0, &PointerSnapshot::default()).unwrap();
        assert_eq!(outcome, FrameOutcome::Drawn);
        assert_eq!(engine.stats().frames_drawn, 1);
        assert_eq!(engine.stats().programs_linked, 1);
    }

    #[test]
    fn second_initialize_is_rejected() {
        let Some(mut engine) = gpu_engine(64.0, 64.0, 1.0) else { return };
        let err = engine.initialize_headless(surface(64.0, 64.0, 1.0)).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyInitialized));
    }

    #[test]
    fn malformed_shader_keeps_previous_program_drawing() {
        let Some(mut engine) = gpu_engine(200.0, 100.0, 2.0) else { return };

        let diagnostic = engine.update_shader_source(BROKEN);
        assert!(diagnostic.is_some());
        assert!(engine.is_linked());
        assert_eq!(engine.stats().programs_linked, 1);

        let snapshot = PointerSnapshot {
            first: Vec2::new(10.0, 10.0),
            count: 1,
            positions: vec![10.0, 10.0],
            movement: Vec2::ZERO,
        };
        assert_eq!(engine.render(100.0, &snapshot).unwrap(), FrameOutcome::Drawn);
    }

    /// Fragment source with the standard uniform block and the given output
    /// type, pointer array and body.
    fn fragment_with(output: &str, pointers: &str, body: &str) -> String {
        format!(
            "struct VertexOutput {{
                @builtin(position) position: vec4<f32>,
                @location(0) uv: vec2<f32>,
            }}
            struct Uniforms {{
                resolution: vec2<f32>,
                time: f32,
                pointer_count: i32,
                movement: vec2<f32>,
                touch: vec2<f32>,
                pointers: {pointers},
            }}
            @group(0) @binding(0) var<uniform> u: Uniforms;
            @fragment
            fn fs_main(in: VertexOutput) -> @location(0) {output} {{
                {body}
            }}"
        )
    }

    fn narrow_output() -> String {
        fragment_with("vec2<f32>", "array<vec4<f32>, 4>", "return in.uv * u.time;")
    }

    fn oversized_block() -> String {
        fragment_with(
            "vec4<f32>",
            "array<vec4<f32>, 100000>",
            "return vec4<f32>(u.pointers[0].xy, u.time, 1.0);",
        )
    }

    fn vec2_pointer_array() -> String {
        fragment_with(
            "vec4<f32>",
            "array<vec2<f32>, 4>",
            "return vec4<f32>(u.pointers[0], u.time, 1.0);",
        )
    }

    #[test]
    fn test_compile_agrees_with_update() {
        let Some(mut engine) = gpu_engine(64.0, 64.0, 1.0) else { return };

        let candidates = [
            DEFAULT_FRAGMENT_SOURCE.to_string(),
            BROKEN.to_string(),
            // Compiles, but has no uniform block.
            "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }"
                .to_string(),
            String::new(),
            narrow_output(),
            oversized_block(),
            vec2_pointer_array(),
            fragment_with("vec4<f32>", "array<vec4<f32>, 4>", "return vec4<f32>(u.time);"),
        ];
        for src in &candidates {
            let predicted = engine.test_compile(src).is_none();
            let before = engine.stats().programs_linked;
            let result = engine.update_shader_source(src);
            assert_eq!(predicted, result.is_none(), "source: {src}");
            assert_eq!(predicted, engine.stats().programs_linked == before + 1);
            assert!(engine.is_linked());
        }
    }

    #[test]
    fn sources_the_device_cannot_build_are_rejected() {
        let Some(mut engine) = gpu_engine(64.0, 64.0, 1.0) else { return };

        for src in [narrow_output(), oversized_block(), vec2_pointer_array()] {
            assert!(engine.test_compile(&src).is_some(), "source: {src}");
            assert!(engine.update_shader_source(&src).is_some(), "source: {src}");
        }

        // The default program is still the one drawing.
        assert_eq!(engine.stats().programs_linked, 1);
        assert!(engine.is_linked());
        assert_eq!(engine.render(16.0, &PointerSnapshot::default()).unwrap(), FrameOutcome::Drawn);
    }

    #[test]
    fn viewport_follows_latest_resize() {
        let Some(mut engine) = gpu_engine(100.0, 100.0, 1.0) else { return };
        for (w, h, k) in [(640.0, 480.0, 1.0), (1024.0, 768.0, 1.5), (300.0, 200.0, 3.0)] {
            engine.update_scale(surface(w, h, k));
            engine.render(0.0, &PointerSnapshot::default()).unwrap();
        }
        assert_eq!(engine.viewport(), Some((900, 600)));
    }

    #[test]
    fn zero_area_viewport_skips() {
        let Some(mut engine) = gpu_engine(100.0, 100.0, 1.0) else { return };
        engine.update_scale(surface(0.0, 100.0, 1.0));
        let outcome = engine.render(0.0, &PointerSnapshot::default()).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::ZeroArea));

        engine.update_scale(surface(50.0, 50.0, 1.0));
        assert_eq!(engine.render(1.0, &PointerSnapshot::default()).unwrap(), FrameOutcome::Drawn);
    }

    #[test]
    fn reset_then_render_skips() {
        let Some(mut engine) = gpu_engine(64.0, 64.0, 1.0) else { return };
        engine.reset();
        let outcome = engine.render(0.0, &PointerSnapshot::default()).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::NoProgram));
    }

    #[test]
    fn release_is_idempotent() {
        let Some(mut engine) = gpu_engine(64.0, 64.0, 1.0) else { return };
        engine.release();
        assert!(!engine.is_initialized() && !engine.is_linked());
        engine.release();
        assert!(!engine.is_initialized() && !engine.is_linked());

        let outcome = engine.render(0.0, &PointerSnapshot::default()).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::NoContext));
    }
}
