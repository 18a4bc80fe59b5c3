/// Represents a single acquired frame.
///
/// Short-lived: holding a surface texture prevents acquisition of the next
/// one. Offscreen frames carry no surface texture.
pub struct GpuFrame {
    pub surface_texture: Option<wgpu::SurfaceTexture>,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
