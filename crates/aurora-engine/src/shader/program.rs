use std::num::NonZeroU64;

use crate::error::EngineError;
use crate::render::{FrameUniforms, QuadVertex};

use super::compile::{compile_stage, CompiledStage, ShaderStage};
use super::link::{link_stages, UniformLocations, UNIFORM_BINDING};
use super::source::VERTEX_SOURCE;

/// Compiled stages plus the linked GPU program built from them.
///
/// `compile` and `link` follow the classic two-step model: stages are
/// compiled one at a time, then linked. A failed link never touches the
/// program that is currently drawing.
#[derive(Default)]
pub struct ShaderProgram {
    vertex: Option<CompiledStage>,
    fragment: Option<CompiledStage>,
    linked: Option<LinkedProgram>,
    links: u64,
}

/// GPU objects for one successful link.
pub(crate) struct LinkedProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    locations: UniformLocations,
    staging: Vec<u8>,
}

impl ShaderProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles one stage, replacing any previously compiled source for it.
    ///
    /// Logs the diagnostic and returns `false` on failure; the stage is then
    /// left empty so a following `link` fails.
    pub fn compile(&mut self, stage: ShaderStage, source: &str) -> bool {
        let compiled = match compile_stage(stage, source) {
            Ok(compiled) => Some(compiled),
            Err(err) => {
                log::error!("{err}");
                None
            }
        };
        let ok = compiled.is_some();

        match stage {
            ShaderStage::Vertex => self.vertex = compiled,
            ShaderStage::Fragment => self.fragment = compiled,
        }
        ok
    }

    /// Links the compiled stages and creates the GPU program.
    ///
    /// On failure the diagnostic is logged and the current program (if any)
    /// stays in place.
    pub fn link(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) -> bool {
        match self.relink(device, format) {
            Ok(()) => true,
            Err(err) => {
                log::error!("{err}");
                false
            }
        }
    }

    /// Compiles `fragment_source` against the built-in vertex stage and links
    /// the pair. The running program is replaced only when every step,
    /// including creation on the device, succeeds.
    pub(crate) fn install(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        fragment_source: &str,
    ) -> Result<(), EngineError> {
        let vertex = compile_stage(ShaderStage::Vertex, VERTEX_SOURCE)?;
        let fragment = compile_stage(ShaderStage::Fragment, fragment_source)?;
        self.vertex = Some(vertex);
        self.fragment = Some(fragment);
        self.relink(device, format)
    }

    /// Builds a throwaway program for `fragment_source` and drops it.
    pub(crate) fn check_on_device(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        fragment_source: &str,
    ) -> Result<(), EngineError> {
        let vertex = compile_stage(ShaderStage::Vertex, VERTEX_SOURCE)?;
        let fragment = compile_stage(ShaderStage::Fragment, fragment_source)?;
        let locations = link_stages(&vertex, &fragment, block_limit(device))?;
        LinkedProgram::create(device, format, &vertex, &fragment, locations).map(drop)
    }

    fn relink(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> Result<(), EngineError> {
        let (Some(vertex), Some(fragment)) = (&self.vertex, &self.fragment) else {
            return Err(EngineError::Link(
                "both stages must compile before linking".to_string(),
            ));
        };
        let locations = link_stages(vertex, fragment, block_limit(device))?;
        let linked = LinkedProgram::create(device, format, vertex, fragment, locations)?;

        log::debug!(
            "shader program linked (uniform block {} bytes, {} pointer slots)",
            linked.locations.block_size,
            linked.locations.pointers.len
        );
        self.linked = Some(linked);
        self.links += 1;
        Ok(())
    }

    /// Drops the stages and the linked program.
    pub fn reset(&mut self) {
        if self.linked.is_some() {
            log::debug!("releasing shader program");
        }
        self.vertex = None;
        self.fragment = None;
        self.linked = None;
    }

    pub fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    /// Uniform table of the program that is currently drawing.
    pub fn locations(&self) -> Option<&UniformLocations> {
        self.linked.as_ref().map(|p| &p.locations)
    }

    /// Number of successful links over the lifetime of this program.
    pub fn link_count(&self) -> u64 {
        self.links
    }

    pub(crate) fn linked_mut(&mut self) -> Option<&mut LinkedProgram> {
        self.linked.as_mut()
    }
}

impl LinkedProgram {
    fn create(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        vertex: &CompiledStage,
        fragment: &CompiledStage,
        locations: UniformLocations,
    ) -> Result<Self, EngineError> {
        // Uniform buffers are bound in 16-byte units.
        let buffer_size = u64::from(locations.block_size).next_multiple_of(16);
        let min_binding_size = NonZeroU64::new(u64::from(locations.block_size))
            .ok_or_else(|| EngineError::Link("uniform block is empty".to_string()))?;

        let (pipeline, bind_group, uniform_buffer) = with_error_scope(device, || {
            let vs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("aurora vertex stage"),
                source: wgpu::ShaderSource::Wgsl(vertex.source().into()),
            });
            let fs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("aurora fragment stage"),
                source: wgpu::ShaderSource::Wgsl(fragment.source().into()),
            });

            let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("aurora uniforms"),
                size: buffer_size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("aurora uniforms bgl"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: UNIFORM_BINDING,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: Some(min_binding_size),
                        },
                        count: None,
                    }],
                });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("aurora uniforms bind group"),
                layout: &bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("aurora pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("aurora background pipeline"),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &vs_module,
                    entry_point: Some(ShaderStage::Vertex.entry_point()),
                    compilation_options: Default::default(),
                    buffers: &[QuadVertex::layout()],
                },

                fragment: Some(wgpu::FragmentState {
                    module: &fs_module,
                    entry_point: Some(ShaderStage::Fragment.entry_point()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

            (pipeline, bind_group, uniform_buffer)
        })?;

        Ok(Self {
            pipeline,
            bind_group,
            uniform_buffer,
            locations,
            staging: vec![0; buffer_size as usize],
        })
    }

    /// Packs `uniforms` with the resolved locations and queues the upload.
    pub(crate) fn upload(&mut self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        uniforms.write_into(&self.locations, &mut self.staging);
        queue.write_buffer(&self.uniform_buffer, 0, &self.staging);
    }
}

fn block_limit(device: &wgpu::Device) -> u32 {
    device.limits().max_uniform_buffer_binding_size
}

/// Runs `build` inside validation and out-of-memory error scopes and turns a
/// captured device error into a link error.
fn with_error_scope<T>(
    device: &wgpu::Device,
    build: impl FnOnce() -> T,
) -> Result<T, EngineError> {
    let out_of_memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let value = build();

    // Scopes pop innermost first.
    let validation = pollster::block_on(validation.pop());
    let out_of_memory = pollster::block_on(out_of_memory.pop());
    match validation.or(out_of_memory) {
        Some(err) => Err(EngineError::Link(format!("device rejected the program: {err}"))),
        None => Ok(value),
    }
}
