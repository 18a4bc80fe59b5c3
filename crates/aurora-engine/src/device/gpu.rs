use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::SurfaceError;

use crate::error::EngineError;

use super::surface;
use super::{GpuFrame, GpuInit, SurfaceErrorAction};

/// Where frames end up.
enum Target<'w> {
    /// Swapchain bound to a window.
    Surface {
        surface: wgpu::Surface<'w>,
        config: wgpu::SurfaceConfiguration,
    },

    /// Offscreen color texture for headless hosts.
    Offscreen {
        texture: wgpu::Texture,
        format: wgpu::TextureFormat,
    },
}

/// Owns the wgpu core objects and the presentation target.
///
/// - creates and stores Instance/Adapter/Device/Queue
/// - creates and configures the Surface, or an offscreen texture when there
///   is no window
/// - acquires frames and provides an encoder + view for rendering
pub struct Gpu<'w> {
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target<'w>,

    /// Last requested size in physical pixels; may be zero while minimized.
    size: (u32, u32),
}

impl<'w> Gpu<'w> {
    /// Creates a GPU context bound to a window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn for_window<W>(
        window: &'w W,
        size: (u32, u32),
        init: GpuInit,
    ) -> Result<Self, EngineError>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync,
    {
        let instance = new_instance();

        let surface = instance
            .create_surface(window)
            .map_err(|e| unavailable("failed to create wgpu surface", e))?;

        let adapter = request_adapter(&instance, Some(&surface), &init).await?;
        let (device, queue) = request_device(&adapter, &init).await?;

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps, init.prefer_srgb).ok_or_else(|| {
            EngineError::ContextUnavailable("surface reports no supported formats".to_string())
        })?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.0.max(1),
            height: size.1.max(1),
            present_mode: init.present_mode,
            alpha_mode: surface::choose_alpha_mode(&caps, init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        log::info!(
            "GPU ready: {} ({:?}), surface {:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            format,
            config.width,
            config.height
        );

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            target: Target::Surface { surface, config },
            size,
        })
    }

    /// Creates a GPU context that renders into an offscreen texture.
    pub async fn headless(size: (u32, u32), init: GpuInit) -> Result<Self, EngineError> {
        let instance = new_instance();
        let adapter = request_adapter(&instance, None, &init).await?;
        let (device, queue) = request_device(&adapter, &init).await?;

        let format = surface::offscreen_format(init.prefer_srgb);
        let texture = offscreen_texture(&device, format, size);

        log::info!(
            "headless GPU ready: {} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            target: Target::Offscreen { texture, format },
            size,
        })
    }

    /// Color format of the presentation target.
    pub fn format(&self) -> wgpu::TextureFormat {
        match &self.target {
            Target::Surface { config, .. } => config.format,
            Target::Offscreen { format, .. } => *format,
        }
    }

    /// Current drawable size (physical pixels).
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Resizes the presentation target. Zero-area sizes are remembered but
    /// leave the target as it is.
    pub fn resize(&mut self, size: (u32, u32)) {
        self.size = size;
        let (device, target) = (&self.device, &mut self.target);

        match target {
            Target::Surface { surface, config } => {
                surface::apply_resize(surface, device, config, size);
            }
            Target::Offscreen { texture, format } => {
                if size.0 == 0 || size.1 == 0 {
                    return;
                }
                if (texture.width(), texture.height()) != size {
                    *texture = offscreen_texture(device, *format, size);
                }
            }
        }
    }

    /// Acquires the next target texture and creates an encoder.
    pub fn begin_frame(&self) -> Result<GpuFrame, SurfaceError> {
        let (surface_texture, view) = match &self.target {
            Target::Surface { surface, .. } => {
                let st = surface.get_current_texture()?;
                let view = st.texture.create_view(&wgpu::TextureViewDescriptor::default());
                (Some(st), view)
            }
            Target::Offscreen { texture, .. } => {
                (None, texture.create_view(&wgpu::TextureViewDescriptor::default()))
            }
        };

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("aurora frame encoder"),
            });

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
        })
    }

    /// Submits the recorded commands and presents the frame.
    pub fn submit(&self, frame: GpuFrame) {
        let GpuFrame {
            surface_texture,
            view,
            encoder,
        } = frame;

        self.queue.submit(std::iter::once(encoder.finish()));
        drop(view);
        if let Some(st) = surface_texture {
            st.present();
        }
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        match &self.target {
            Target::Surface { surface, config } => {
                surface::map_surface_error(surface, &self.device, config, err)
            }
            Target::Offscreen { .. } => SurfaceErrorAction::SkipFrame,
        }
    }
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

async fn request_adapter(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
    init: &GpuInit,
) -> Result<wgpu::Adapter, EngineError> {
    let options = |force_fallback_adapter| wgpu::RequestAdapterOptions {
        power_preference: init.power_preference,
        compatible_surface,
        force_fallback_adapter,
    };

    match instance.request_adapter(&options(false)).await {
        Ok(adapter) => Ok(adapter),
        Err(err) if init.allow_fallback_adapter => {
            log::warn!("no hardware adapter ({err}); trying a fallback adapter");
            instance
                .request_adapter(&options(true))
                .await
                .map_err(|e| unavailable("failed to find a GPU adapter", e))
        }
        Err(err) => Err(unavailable("failed to find a suitable GPU adapter", err)),
    }
}

async fn request_device(
    adapter: &wgpu::Adapter,
    init: &GpuInit,
) -> Result<(wgpu::Device, wgpu::Queue), EngineError> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("aurora-engine device"),
            required_features: init.required_features,
            required_limits: init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
        })
        .await
        .map_err(|e| unavailable("failed to create wgpu device/queue", e))
}

fn offscreen_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    (width, height): (u32, u32),
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("aurora offscreen target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn unavailable(what: &str, err: impl std::fmt::Display) -> EngineError {
    EngineError::ContextUnavailable(format!("{what}: {err}"))
}
