//! wgpu implementation of [`GraphicsDevice`].

use std::collections::HashMap;
use std::sync::Arc;

use slotmap::SlotMap;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{
    BindGroupId, BindingResource, BufferId, GraphicsDevice, PassCommand, PassEncoder, PipelineId,
    Shading, TextureId,
};
use crate::config::ViewerConfig;
use crate::error::DeviceError;
use crate::geometry::Topology;
use crate::math::Matrix4;
use crate::texture::TextureData;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Empty vertex data still gets a buffer so it can be bound.
const MIN_BUFFER_SIZE: usize = 16;

static COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x3,
    offset: 0,
    shader_location: 0,
}];

static UV_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: 0,
}];

static POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x3,
    offset: 0,
    shader_location: 1,
}];

static NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x3,
    offset: 0,
    shader_location: 2,
}];

fn vertex_layout(
    stride: usize,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

/// One vertex buffer per attribute, in slot order.
fn vertex_layouts(shading: Shading) -> Vec<wgpu::VertexBufferLayout<'static>> {
    let vec3 = std::mem::size_of::<[f32; 3]>();
    let vec2 = std::mem::size_of::<[f32; 2]>();
    let layouts = match shading {
        Shading::Flat => vec![
            vertex_layout(vec3, &COLOR_ATTRIBUTES),
            vertex_layout(vec3, &POSITION_ATTRIBUTES),
        ],
        Shading::Lit => vec![
            vertex_layout(vec3, &COLOR_ATTRIBUTES),
            vertex_layout(vec3, &POSITION_ATTRIBUTES),
            vertex_layout(vec3, &NORMAL_ATTRIBUTES),
        ],
        Shading::Textured => vec![
            vertex_layout(vec2, &UV_ATTRIBUTES),
            vertex_layout(vec3, &POSITION_ATTRIBUTES),
        ],
    };
    debug_assert_eq!(layouts.len() as u32, shading.vertex_slots());
    layouts
}

fn shader_source(shading: Shading) -> &'static str {
    match shading {
        Shading::Flat => include_str!("shaders/flat.wgsl"),
        Shading::Lit => include_str!("shaders/lit.wgsl"),
        Shading::Textured => include_str!("shaders/textured.wgsl"),
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// The surface texture being rendered this frame, plus the pass that clears it.
struct Frame {
    surface: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    clear: wgpu::CommandBuffer,
}

/// Renders into a window surface through wgpu.
///
/// Resources live in slot maps keyed by the ids handed out to tasks. Releasing
/// an id drops the wgpu handle; wgpu keeps the underlying resource alive until
/// every submitted command buffer that uses it has finished.
pub struct GpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    clear_color: wgpu::Color,
    buffers: SlotMap<BufferId, wgpu::Buffer>,
    textures: SlotMap<TextureId, GpuTexture>,
    pipelines: SlotMap<PipelineId, wgpu::RenderPipeline>,
    pipeline_cache: HashMap<(Shading, Topology), PipelineId>,
    bind_groups: SlotMap<BindGroupId, wgpu::BindGroup>,
    frame: Option<Frame>,
}

impl GpuDevice {
    /// Creates a device rendering into `window`.
    ///
    /// Picks an adapter compatible with the window surface, requests a
    /// device, and configures the surface with an sRGB format. Present mode
    /// follows [`ViewerConfig::vsync`].
    pub fn new(window: Arc<Window>, options: &ViewerConfig) -> Result<Self, DeviceError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Tessera Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if options.vsync {
                wgpu::PresentMode::Fifo
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, config.width, config.height);
        let [r, g, b, a] = options.clear_color;

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            clear_color: wgpu::Color { r, g, b, a },
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            pipeline_cache: HashMap::new(),
            bind_groups: SlotMap::with_key(),
            frame: None,
        })
    }

    /// The underlying wgpu device, for work outside the scene.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Runs an allocation inside validation and out-of-memory error scopes,
    /// turning a captured error into [`DeviceError::Allocation`].
    fn scoped<T>(&self, label: &str, allocate: impl FnOnce(&wgpu::Device) -> T) -> Result<T, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = allocate(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(source) => Err(DeviceError::Allocation {
                label: label.to_owned(),
                source,
            }),
            None => Ok(value),
        }
    }

    fn create_pipeline(&self, shading: Shading, topology: Topology) -> Result<wgpu::RenderPipeline, DeviceError> {
        let label = format!("{shading:?} {topology:?} Pipeline");
        self.scoped(&label, |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(shader_source(shading).into()),
            });
            let buffers = vertex_layouts(shading);

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: match topology {
                        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
                        Topology::LineList => wgpu::PrimitiveTopology::LineList,
                    },
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

impl GraphicsDevice for GpuDevice {
    type CommandBuffer = wgpu::CommandBuffer;

    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, DeviceError> {
        let padding = [0u8; MIN_BUFFER_SIZE];
        let contents = if contents.is_empty() { &padding[..] } else { contents };
        let buffer = self.scoped(label, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            })
        })?;
        Ok(self.buffers.insert(buffer))
    }

    fn create_uniform_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, DeviceError> {
        let size = size.max(16).next_multiple_of(16);
        let buffer = self.scoped(label, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;
        Ok(self.buffers.insert(buffer))
    }

    fn create_texture(&mut self, label: &str, data: &TextureData) -> Result<TextureId, DeviceError> {
        let texture = self.scoped(label, |device| {
            let texture = device.create_texture_with_data(
                &self.queue,
                &wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: data.width,
                        height: data.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8UnormSrgb,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &data.rgba,
            );
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::Repeat,
                address_mode_w: wgpu::AddressMode::Repeat,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });
            GpuTexture {
                _texture: texture,
                view,
                sampler,
            }
        })?;
        Ok(self.textures.insert(texture))
    }

    fn pipeline(&mut self, shading: Shading, topology: Topology) -> Result<PipelineId, DeviceError> {
        if let Some(&id) = self.pipeline_cache.get(&(shading, topology)) {
            return Ok(id);
        }
        let pipeline = self.create_pipeline(shading, topology)?;
        let id = self.pipelines.insert(pipeline);
        self.pipeline_cache.insert((shading, topology), id);
        log::debug!("created {shading:?} pipeline for {topology:?}");
        Ok(id)
    }

    fn create_bind_group(
        &mut self,
        label: &str,
        pipeline: PipelineId,
        resources: &[BindingResource],
    ) -> Result<BindGroupId, DeviceError> {
        let bind_group = {
            let pipeline = self
                .pipelines
                .get(pipeline)
                .ok_or(DeviceError::UnknownResource { kind: "pipeline" })?;
            let layout = pipeline.get_bind_group_layout(0);

            let entries = resources
                .iter()
                .enumerate()
                .map(|(binding, resource)| {
                    let resource = match *resource {
                        BindingResource::Buffer(id) => self
                            .buffers
                            .get(id)
                            .ok_or(DeviceError::UnknownResource { kind: "buffer" })?
                            .as_entire_binding(),
                        BindingResource::Sampler(id) => wgpu::BindingResource::Sampler(
                            &self
                                .textures
                                .get(id)
                                .ok_or(DeviceError::UnknownResource { kind: "texture" })?
                                .sampler,
                        ),
                        BindingResource::TextureView(id) => wgpu::BindingResource::TextureView(
                            &self
                                .textures
                                .get(id)
                                .ok_or(DeviceError::UnknownResource { kind: "texture" })?
                                .view,
                        ),
                    };
                    Ok(wgpu::BindGroupEntry {
                        binding: binding as u32,
                        resource,
                    })
                })
                .collect::<Result<Vec<_>, DeviceError>>()?;

            self.scoped(label, |device| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(label),
                    layout: &layout,
                    entries: &entries,
                })
            })?
        };
        Ok(self.bind_groups.insert(bind_group))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let buffer = self
            .buffers
            .get(buffer)
            .ok_or(DeviceError::UnknownResource { kind: "buffer" })?;
        self.queue.write_buffer(buffer, offset, data);
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<(), DeviceError> {
        if self.frame.take().is_some() {
            log::warn!("previous frame was never submitted, dropping it");
        }

        let surface = match self.surface.get_current_texture() {
            Ok(surface) => surface,
            Err(err) => {
                if matches!(err, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) {
                    self.surface.configure(&self.device, &self.config);
                }
                return Err(err.into());
            }
        };
        let view = surface
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.frame = Some(Frame {
            surface,
            view,
            clear: encoder.finish(),
        });
        Ok(())
    }

    fn encode_pass(&mut self, pass: &PassEncoder) -> Result<wgpu::CommandBuffer, DeviceError> {
        let frame = self.frame.as_ref().ok_or(DeviceError::NoFrame)?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Object Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Object Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for command in pass.commands() {
                match command {
                    PassCommand::SetPipeline(id) => {
                        let pipeline = self
                            .pipelines
                            .get(*id)
                            .ok_or(DeviceError::UnknownResource { kind: "pipeline" })?;
                        render_pass.set_pipeline(pipeline);
                    }
                    PassCommand::SetBindGroup(index, id) => {
                        let bind_group = self
                            .bind_groups
                            .get(*id)
                            .ok_or(DeviceError::UnknownResource { kind: "bind group" })?;
                        render_pass.set_bind_group(*index, bind_group, &[]);
                    }
                    PassCommand::SetVertexBuffer(slot, id) => {
                        let buffer = self
                            .buffers
                            .get(*id)
                            .ok_or(DeviceError::UnknownResource { kind: "buffer" })?;
                        render_pass.set_vertex_buffer(*slot, buffer.slice(..));
                    }
                    PassCommand::Draw { vertices } => {
                        if !vertices.is_empty() {
                            render_pass.draw(vertices.clone(), 0..1);
                        }
                    }
                }
            }
        }
        Ok(encoder.finish())
    }

    fn submit(&mut self, command_buffers: Vec<wgpu::CommandBuffer>) -> Result<(), DeviceError> {
        let frame = self.frame.take().ok_or(DeviceError::NoFrame)?;
        log::trace!("submitting {} object passes", command_buffers.len());
        self.queue
            .submit(std::iter::once(frame.clear).chain(command_buffers));
        frame.surface.present();
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(buffer).is_none() {
            log::debug!("release of unknown buffer ignored");
        }
    }

    fn release_bind_group(&mut self, bind_group: BindGroupId) {
        if self.bind_groups.remove(bind_group).is_none() {
            log::debug!("release of unknown bind group ignored");
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        if self.textures.remove(texture).is_none() {
            log::debug!("release of unknown texture ignored");
        }
    }

    fn viewport(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Ignores zero sizes, which occur while the window is minimized.
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, width, height);
        }
    }

    /// Remaps clip depth from `[-w, w]` to wgpu's `[0, w]`.
    #[rustfmt::skip]
    fn clip_correction(&self) -> Matrix4 {
        Matrix4::from_cols_array([
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.5, 0.0,
            0.0, 0.0, 0.5, 1.0,
        ])
    }
}
