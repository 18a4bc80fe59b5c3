/// Initialization parameters for the GPU layer.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB format for the presentation target when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). FIFO is supported everywhere and paces
    /// the loop to the display.
    pub present_mode: wgpu::PresentMode,

    /// Alpha mode preference; replaced by a supported one when unavailable.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Background renderers should not need the discrete GPU.
    pub power_preference: wgpu::PowerPreference,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Hint only; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,

    /// Accept a software adapter when no hardware one is available.
    pub allow_fallback_adapter: bool,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::LowPower,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            allow_fallback_adapter: false,
        }
    }
}

impl GpuInit {
    /// Settings for tests and offscreen hosts: any adapter will do.
    pub fn headless() -> Self {
        Self {
            allow_fallback_adapter: true,
            ..Self::default()
        }
    }
}
