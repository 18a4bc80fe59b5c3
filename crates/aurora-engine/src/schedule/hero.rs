use crate::coords::SurfaceState;
use crate::error::EngineError;
use crate::input::{MovementPolicy, PointerEvent, PointerTracker};
use crate::render::FrameOutcome;

use super::renderer::FrameRenderer;
use super::scheduler::{FrameScheduler, TickOutcome};

/// The background loop: one renderer, one pointer tracker, one clock source.
///
/// Lifecycle: `new` -> `setup` -> `start` -> `tick`... -> `teardown`.
/// Teardown may happen at any point, including after a failed setup, and may
/// be repeated.
pub struct HeroLoop<R> {
    renderer: Option<R>,
    tracker: PointerTracker,
    policy: MovementPolicy,

    /// Pointer and resize events are only accepted while attached.
    attached: bool,
    running: bool,
    torn_down: bool,
}

impl<R: FrameRenderer> HeroLoop<R> {
    /// Creates a detached loop for a surface; nothing is acquired yet.
    pub fn new(surface: SurfaceState, policy: MovementPolicy) -> Self {
        Self {
            renderer: None,
            tracker: PointerTracker::new(surface),
            policy,
            attached: false,
            running: false,
            torn_down: false,
        }
    }

    /// Builds the renderer for the current surface, installs `shader_source`
    /// and attaches input.
    ///
    /// Returns the shader diagnostic when the source was rejected; the loop is
    /// still set up and simply skips frames until a valid source arrives. An
    /// `Err` means no renderer exists and the host should show a static
    /// background.
    pub fn setup<F>(&mut self, init: F, shader_source: &str) -> Result<Option<String>, EngineError>
    where
        F: FnOnce(SurfaceState) -> Result<R, EngineError>,
    {
        if self.torn_down {
            return Err(EngineError::StaleResourceAccess("loop was torn down"));
        }
        if self.renderer.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }

        let mut renderer = init(self.tracker.surface())?;
        let diagnostic = renderer.update_shader_source(shader_source);
        if let Some(d) = &diagnostic {
            log::error!("initial shader rejected, background stays blank:\n{d}");
        }

        self.renderer = Some(renderer);
        self.attached = true;
        Ok(diagnostic)
    }

    /// Validates and installs a replacement fragment source.
    pub fn update_shader_source(&mut self, source: &str) -> Option<String> {
        match &mut self.renderer {
            Some(r) => r.update_shader_source(source),
            None => Some(EngineError::StaleResourceAccess("renderer").to_string()),
        }
    }

    /// Feeds one pointer event to the tracker.
    pub fn on_pointer(&mut self, event: PointerEvent) {
        if self.attached {
            self.tracker.apply(event);
        }
    }

    /// Propagates a new size or scale to both the tracker and the renderer.
    pub fn on_resize(&mut self, surface: SurfaceState) {
        if self.torn_down {
            return;
        }
        self.tracker.update_scale(surface);
        if let Some(r) = &mut self.renderer {
            r.update_scale(surface);
        }
    }

    /// Stops the loop, detaches input and releases the renderer.
    pub fn teardown(&mut self) {
        self.running = false;
        self.attached = false;
        if let Some(mut renderer) = self.renderer.take() {
            renderer.release();
            log::info!("hero loop torn down");
        }
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn surface(&self) -> SurfaceState {
        self.tracker.surface()
    }

    pub fn tracker(&self) -> &PointerTracker {
        &self.tracker
    }

    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    pub fn movement_policy(&self) -> MovementPolicy {
        self.policy
    }
}

impl<R: FrameRenderer> FrameScheduler for HeroLoop<R> {
    fn start(&mut self) {
        if self.renderer.is_none() {
            log::warn!("hero loop start ignored: no renderer");
            return;
        }
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn tick(&mut self, timestamp_ms: f64) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        let Some(renderer) = &mut self.renderer else {
            return TickOutcome::Idle;
        };

        let snapshot = self.tracker.snapshot();
        match renderer.render(timestamp_ms, &snapshot) {
            Ok(FrameOutcome::Drawn) => {
                if self.policy == MovementPolicy::ResetPerFrame {
                    self.tracker.consume_movement();
                }
                TickOutcome::Rendered
            }
            Ok(FrameOutcome::Skipped(reason)) => TickOutcome::Skipped(reason),
            Err(err) => {
                log::error!("background renderer failed: {err}");
                self.teardown();
                TickOutcome::Failed
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::coords::Vec2;
    use crate::input::{PointerId, PointerSnapshot};
    use crate::render::SkipReason;
    use crate::shader::{self, DEFAULT_FRAGMENT_SOURCE};

    #[derive(Debug, Default)]
    struct Journal {
        installed: Vec<String>,
        scales: Vec<SurfaceState>,
        frames: Vec<(f64, PointerSnapshot)>,
        releases: usize,
    }

    /// Renderer double that validates shaders for real but draws nothing.
    struct Recording {
        journal: Rc<RefCell<Journal>>,
        linked: bool,
        fail_next: bool,
    }

    impl FrameRenderer for Recording {
        fn update_shader_source(&mut self, source: &str) -> Option<String> {
            let diagnostic = shader::test_compile(source);
            if diagnostic.is_none() {
                self.linked = true;
                self.journal.borrow_mut().installed.push(source.to_string());
            }
            diagnostic
        }

        fn update_scale(&mut self, surface: SurfaceState) {
            self.journal.borrow_mut().scales.push(surface);
        }

        fn render(
            &mut self,
            ts: f64,
            pointers: &PointerSnapshot,
        ) -> Result<FrameOutcome, EngineError> {
            if self.fail_next {
                return Err(EngineError::SurfaceLost);
            }
            if !self.linked {
                return Ok(FrameOutcome::Skipped(SkipReason::NoProgram));
            }
            self.journal.borrow_mut().frames.push((ts, pointers.clone()));
            Ok(FrameOutcome::Drawn)
        }

        fn release(&mut self) {
            self.linked = false;
            self.journal.borrow_mut().releases += 1;
        }
    }

    const BROKEN: &str = "@fragment fn fs_main( -> {";

    fn mouse_move(x: f32, dx: f32) -> PointerEvent {
        PointerEvent::Move { id: PointerId::Mouse, x, y: 0.0, dx, dy: 0.0 }
    }

    fn surface(w: f32, h: f32, scale: f32) -> SurfaceState {
        SurfaceState::new(w, h, scale).unwrap()
    }

    fn running_loop(policy: MovementPolicy) -> (HeroLoop<Recording>, Rc<RefCell<Journal>>) {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut hero = HeroLoop::new(surface(800.0, 600.0, 2.0), policy);
        let j = journal.clone();
        let diagnostic = hero
            .setup(
                move |_| Ok(Recording { journal: j, linked: false, fail_next: false }),
                DEFAULT_FRAGMENT_SOURCE,
            )
            .unwrap();
        assert_eq!(diagnostic, None);
        hero.start();
        (hero, journal)
    }

    #[test]
    fn setup_installs_shader_and_ticks_render() {
        let (mut hero, journal) = running_loop(MovementPolicy::default());
        assert_eq!(journal.borrow().installed.len(), 1);

        assert_eq!(hero.tick(16.0), TickOutcome::Rendered);
        assert_eq!(hero.tick(32.0), TickOutcome::Rendered);
        let times: Vec<f64> = journal.borrow().frames.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![16.0, 32.0]);
    }

    #[test]
    fn stopped_loop_does_not_render() {
        let (mut hero, journal) = running_loop(MovementPolicy::default());
        hero.stop();
        assert!(!hero.is_running());
        assert_eq!(hero.tick(16.0), TickOutcome::Idle);
        assert!(journal.borrow().frames.is_empty());
        assert!(!hero.tick(16.0).wants_next_frame());
    }

    #[test]
    fn malformed_initial_shader_is_reported_and_frames_skip() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut hero = HeroLoop::new(surface(100.0, 100.0, 1.0), MovementPolicy::default());
        let j = journal.clone();
        let diagnostic = hero
            .setup(move |_| Ok(Recording { journal: j, linked: false, fail_next: false }), BROKEN)
            .unwrap();
        assert!(diagnostic.is_some());

        hero.start();
        assert_eq!(hero.tick(1.0), TickOutcome::Skipped(SkipReason::NoProgram));

        assert_eq!(hero.update_shader_source(DEFAULT_FRAGMENT_SOURCE), None);
        assert_eq!(hero.tick(2.0), TickOutcome::Rendered);
    }

    #[test]
    fn malformed_replacement_keeps_rendering() {
        let (mut hero, journal) = running_loop(MovementPolicy::default());
        assert!(hero.update_shader_source(BROKEN).is_some());
        assert_eq!(hero.tick(5.0), TickOutcome::Rendered);
        assert_eq!(journal.borrow().installed.len(), 1);
    }

    #[test]
    fn resize_reaches_tracker_and_renderer() {
        let (mut hero, journal) = running_loop(MovementPolicy::default());
        let next = surface(1024.0, 768.0, 1.5);
        hero.on_resize(next);

        assert_eq!(journal.borrow().scales.last(), Some(&next));
        assert_eq!(hero.tracker().surface(), next);

        hero.on_pointer(PointerEvent::Down { id: PointerId::Mouse, x: 100.0, y: 100.0 });
        assert_eq!(hero.tracker().first(), Vec2::new(150.0, 1152.0 - 150.0));
    }

    #[test]
    fn movement_resets_after_each_drawn_frame() {
        let (mut hero, journal) = running_loop(MovementPolicy::ResetPerFrame);
        hero.on_pointer(PointerEvent::Down { id: PointerId::Mouse, x: 0.0, y: 0.0 });
        hero.on_pointer(mouse_move(5.0, 5.0));

        hero.tick(1.0);
        hero.tick(2.0);
        let j = journal.borrow();
        assert_eq!(j.frames[0].1.movement, Vec2::new(10.0, 0.0));
        assert_eq!(j.frames[1].1.movement, Vec2::ZERO);
    }

    #[test]
    fn accumulate_policy_keeps_summing() {
        let (mut hero, journal) = running_loop(MovementPolicy::Accumulate);
        hero.on_pointer(PointerEvent::Down { id: PointerId::Mouse, x: 0.0, y: 0.0 });
        for _ in 0..3 {
            hero.on_pointer(mouse_move(1.0, 1.0));
            hero.tick(1.0);
        }
        assert_eq!(journal.borrow().frames[2].1.movement, Vec2::new(6.0, 0.0));
    }

    #[test]
    fn teardown_twice_is_harmless() {
        let (mut hero, journal) = running_loop(MovementPolicy::default());
        hero.teardown();
        assert!(hero.is_torn_down() && !hero.is_running() && hero.renderer().is_none());
        hero.teardown();
        assert!(hero.is_torn_down() && !hero.is_running() && hero.renderer().is_none());
        assert_eq!(journal.borrow().releases, 1);

        // Input is detached and ticks are inert.
        hero.on_pointer(PointerEvent::Down { id: PointerId::Mouse, x: 1.0, y: 1.0 });
        assert_eq!(hero.tracker().count(), 0);
        assert_eq!(hero.tick(10.0), TickOutcome::Idle);
        hero.start();
        assert!(!hero.is_running());
    }

    #[test]
    fn teardown_after_failed_setup() {
        let mut hero: HeroLoop<Recording> =
            HeroLoop::new(surface(10.0, 10.0, 1.0), MovementPolicy::default());
        let no_adapter =
            |_: SurfaceState| Err(EngineError::ContextUnavailable("no adapter".into()));
        let err = hero.setup(no_adapter, DEFAULT_FRAGMENT_SOURCE).err();
        assert!(matches!(err, Some(EngineError::ContextUnavailable(_))));

        hero.teardown();
        hero.teardown();
        assert!(hero.is_torn_down());
    }

    #[test]
    fn fatal_render_error_tears_down() {
        let (mut hero, journal) = running_loop(MovementPolicy::default());
        if let Some(r) = hero.renderer.as_mut() {
            r.fail_next = true;
        }
        assert_eq!(hero.tick(1.0), TickOutcome::Failed);
        assert!(hero.is_torn_down());
        assert_eq!(journal.borrow().releases, 1);
    }

    #[test]
    fn setup_is_once_only() {
        let (mut hero, journal) = running_loop(MovementPolicy::default());
        let j = journal.clone();
        let init = move |_: SurfaceState| {
            Ok(Recording { journal: j, linked: false, fail_next: false })
        };
        let err = hero.setup(init, DEFAULT_FRAGMENT_SOURCE).err();
        assert!(matches!(err, Some(EngineError::AlreadyInitialized)));
    }
}
