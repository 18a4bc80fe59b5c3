use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::coords::SurfaceState;
use crate::device::GpuInit;
use crate::input::{MovementPolicy, PointerTranslator};
use crate::render::RenderEngine;
use crate::schedule::{FrameScheduler, HeroLoop};
use crate::shader::DEFAULT_FRAGMENT_SOURCE;
use crate::time::FrameClock;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,

    /// WGSL fragment stage installed at setup.
    pub fragment_source: String,
    pub movement_policy: MovementPolicy,
    pub clear_color: wgpu::Color,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "aurora".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            fragment_source: DEFAULT_FRAGMENT_SOURCE.to_string(),
            movement_policy: MovementPolicy::default(),
            clear_color: wgpu::Color::BLACK,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window with the animated background and runs until it is
    /// closed.
    pub fn run(config: RuntimeConfig, gpu_init: GpuInit) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        Ok(())
    }
}

#[self_referencing]
struct HeroWindow {
    translator: PointerTranslator,
    clock: FrameClock,

    window: Window,

    // `None` when no GPU context could be acquired; the window then shows a
    // static background.
    #[borrows(window)]
    #[covariant]
    hero: Option<HeroLoop<RenderEngine<'this>>>,
}

impl HeroWindow {
    fn id(&self) -> WindowId {
        self.with_window(|w| w.id())
    }

    fn request_redraw(&self) {
        self.with_window(|w| w.request_redraw());
    }

    fn resize(&mut self) {
        self.with_mut(|fields| {
            let Some(surface) = surface_of(fields.window) else { return };
            if let Some(hero) = fields.hero.as_mut() {
                hero.on_resize(surface);
            }
        });
        self.request_redraw();
    }

    fn teardown(&mut self) {
        self.with_hero_mut(|hero| {
            if let Some(hero) = hero.as_mut() {
                hero.teardown();
            }
        });
    }
}

struct AppState {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    window: Option<HeroWindow>,
}

impl AppState {
    fn new(config: RuntimeConfig, gpu_init: GpuInit) -> Self {
        Self {
            config,
            gpu_init,
            window: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let config = &self.config;
        let gpu_init = self.gpu_init.clone();

        let entry = HeroWindowBuilder {
            translator: PointerTranslator::new(),
            clock: FrameClock::default(),
            window,
            hero_builder: |w| build_hero(w, config, gpu_init),
        }
        .build();

        entry.request_redraw();
        self.window = Some(entry);
        Ok(())
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut entry) = self.window.take() {
            entry.teardown();
        }
        event_loop.exit();
    }
}

/// Sets up the background loop for a freshly created window.
fn build_hero<'w>(
    window: &'w Window,
    config: &RuntimeConfig,
    gpu_init: GpuInit,
) -> Option<HeroLoop<RenderEngine<'w>>> {
    let Some(surface) = surface_of(window) else {
        log::warn!("window reports an invalid scale factor; background disabled");
        return None;
    };

    let mut hero = HeroLoop::new(surface, config.movement_policy);
    let clear_color = config.clear_color;

    let setup = hero.setup(
        |surface| {
            let mut engine = RenderEngine::new(gpu_init);
            engine.set_clear_color(clear_color);
            engine.initialize(window, surface)?;
            Ok(engine)
        },
        &config.fragment_source,
    );

    match setup {
        Ok(_) => {
            hero.start();
            Some(hero)
        }
        Err(err) => {
            log::warn!("animated background unavailable, using static background: {err}");
            hero.teardown();
            None
        }
    }
}

fn surface_of(window: &Window) -> Option<SurfaceState> {
    let size = window.inner_size();
    SurfaceState::from_physical(size.width, size.height, window.scale_factor())
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        let Some(entry) = self.window.as_mut() else {
            if let Err(e) = self.create_window(event_loop) {
                log::error!("failed to create window: {e:#}");
                event_loop.exit();
            }
            return;
        };

        entry.with_hero_mut(|hero| {
            if let Some(hero) = hero.as_mut() {
                hero.start();
            }
        });
        entry.request_redraw();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(entry) = &mut self.window {
            entry.with_hero_mut(|hero| {
                if let Some(hero) = hero.as_mut() {
                    hero.stop();
                }
            });
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(entry) = self.window.as_mut() else {
            return;
        };
        if entry.id() != window_id {
            return;
        }

        match &event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.close(event_loop);
            }

            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                entry.resize();
            }

            WindowEvent::RedrawRequested => {
                entry.with_mut(|fields| {
                    let Some(hero) = fields.hero.as_mut() else { return };
                    let ft = fields.clock.tick();

                    let outcome = hero.tick(ft.timestamp_ms);
                    log::trace!(
                        "frame {} at {:.1}ms: {outcome:?}",
                        ft.frame_index,
                        ft.timestamp_ms
                    );

                    // The animation frame: keep ticking while the loop runs.
                    if outcome.wants_next_frame() && hero.is_running() {
                        fields.window.request_redraw();
                    }
                });
            }

            _ => {
                entry.with_mut(|fields| {
                    let scale = fields.window.scale_factor();
                    let Some(ev) = fields.translator.translate(scale, &event) else { return };
                    if let Some(hero) = fields.hero.as_mut() {
                        hero.on_pointer(ev);
                    }
                });
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(entry) = &mut self.window {
            entry.teardown();
        }
    }
}
