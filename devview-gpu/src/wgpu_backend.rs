//! `wgpu` implementation of the graphics surface
//!
//! Frames are rendered into an offscreen `Rgba8Unorm` texture so single
//! pixels can be copied back for picking, then blitted to the window surface.
//! There is no multisampling: blended edges would break the color comparison
//! used to detect occluded markers.

use crate::backend::{BufferHandle, BufferUsage, Frame, GraphicsBackend, Program, SceneUniforms};
use crate::device::GpuContext;
use crate::shaders;
use devview_core::{Color3, Error, PixelSource, Result};
use nalgebra::Matrix4;
use winit::window::Window;

/// Format of the offscreen color target
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Converts OpenGL clip space (z in `[-1, 1]`) to wgpu clip space (z in `[0, 1]`)
#[rustfmt::skip]
pub fn opengl_to_wgpu_matrix() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

struct GpuBuffer {
    label: String,
    usage: wgpu::BufferUsages,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
}

struct RenderTargets {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl RenderTargets {
    fn new(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
        }
    }
}

struct Pipelines {
    fill: wgpu::RenderPipeline,
    texture: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
    points: wgpu::RenderPipeline,
    plot_background: wgpu::RenderPipeline,
    plot_lines: wgpu::RenderPipeline,
}

impl Pipelines {
    fn get(&self, program: Program) -> &wgpu::RenderPipeline {
        match program {
            Program::Fill => &self.fill,
            Program::Texture => &self.texture,
            Program::Lines => &self.lines,
            Program::Points => &self.points,
            Program::PlotBackground => &self.plot_background,
            Program::PlotLines => &self.plot_lines,
        }
    }
}

struct PresentTarget<'window> {
    surface: wgpu::Surface<'window>,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
}

/// Graphics backend on top of `wgpu`
pub struct WgpuBackend<'window> {
    gpu: GpuContext,
    present: Option<PresentTarget<'window>>,
    targets: RenderTargets,
    size: (u32, u32),
    pipelines: Pipelines,
    uniform_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    readback: wgpu::Buffer,
    buffers: Vec<GpuBuffer>,
}

/// Per-attribute vertex buffer description
struct Slot {
    attribute: [wgpu::VertexAttribute; 1],
    step_mode: wgpu::VertexStepMode,
}

impl Slot {
    fn new(location: u32, format: wgpu::VertexFormat, step_mode: wgpu::VertexStepMode) -> Self {
        Self {
            attribute: [wgpu::VertexAttribute {
                format,
                offset: 0,
                shader_location: location,
            }],
            step_mode,
        }
    }

    fn layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.attribute[0].format.size(),
            step_mode: self.step_mode,
            attributes: &self.attribute,
        }
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    module: &'a wgpu::ShaderModule,
    vertex: &'a str,
    fragment: &'a str,
    slots: &'a [Slot],
    topology: wgpu::PrimitiveTopology,
    blend: wgpu::BlendState,
    depth_compare: wgpu::CompareFunction,
    depth_write: bool,
    bias: wgpu::DepthBiasState,
}

fn create_pipeline(gpu: &GpuContext, layout: &wgpu::PipelineLayout, spec: PipelineSpec<'_>) -> wgpu::RenderPipeline {
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = spec.slots.iter().map(Slot::layout).collect();
    gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: spec.module,
            entry_point: spec.vertex,
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.module,
            entry_point: spec.fragment,
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: Some(spec.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: spec.depth_write,
            depth_compare: spec.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: spec.bias,
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

fn create_pipelines(gpu: &GpuContext, scene_layout: &wgpu::BindGroupLayout) -> Result<Pipelines> {
    gpu.validated("scene pipelines", |gpu| {
        let scene_module = gpu.create_shader_module("scene shaders", &shaders::scene_source());
        let plot_module = gpu.create_shader_module("plot shaders", shaders::PLOT);
        let layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene pipeline layout"),
            bind_group_layouts: &[scene_layout],
            push_constant_ranges: &[],
        });

        use wgpu::VertexFormat::{Float32, Float32x2, Float32x3, Uint32};
        use wgpu::VertexStepMode::{Instance, Vertex};
        let mesh_slots: Vec<Slot> = (0..5).map(|loc| Slot::new(loc, Float32x3, Vertex)).collect();
        let line_slots = [Slot::new(0, Float32x3, Vertex), Slot::new(1, Float32, Vertex)];
        let point_slots = [Slot::new(0, Float32x3, Instance), Slot::new(1, Uint32, Instance)];
        let plot_slots = [Slot::new(0, Float32x2, Vertex), Slot::new(1, Float32x3, Instance)];

        let fill_bias = wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 1.0,
            clamp: 0.0,
        };
        let mesh = |label: &'static str, fragment: &'static str| PipelineSpec {
            label,
            module: &scene_module,
            vertex: "vs_mesh",
            fragment,
            slots: &mesh_slots,
            topology: wgpu::PrimitiveTopology::TriangleList,
            blend: wgpu::BlendState::REPLACE,
            depth_compare: wgpu::CompareFunction::Less,
            depth_write: true,
            bias: fill_bias,
        };
        let plot = |label: &'static str, topology: wgpu::PrimitiveTopology| PipelineSpec {
            label,
            module: &plot_module,
            vertex: "vs_plot",
            fragment: "fs_plot",
            slots: &plot_slots,
            topology,
            blend: wgpu::BlendState::REPLACE,
            depth_compare: wgpu::CompareFunction::Always,
            depth_write: false,
            bias: wgpu::DepthBiasState::default(),
        };

        Pipelines {
            fill: create_pipeline(gpu, &layout, mesh("fill pipeline", "fs_mesh")),
            texture: create_pipeline(gpu, &layout, mesh("texture pipeline", "fs_texture")),
            lines: create_pipeline(
                gpu,
                &layout,
                PipelineSpec {
                    label: "line pipeline",
                    module: &scene_module,
                    vertex: "vs_lines",
                    fragment: "fs_lines",
                    slots: &line_slots,
                    topology: wgpu::PrimitiveTopology::LineList,
                    blend: wgpu::BlendState::ALPHA_BLENDING,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    depth_write: true,
                    bias: wgpu::DepthBiasState::default(),
                },
            ),
            points: create_pipeline(
                gpu,
                &layout,
                PipelineSpec {
                    label: "point pipeline",
                    module: &scene_module,
                    vertex: "vs_points",
                    fragment: "fs_points",
                    slots: &point_slots,
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    blend: wgpu::BlendState::REPLACE,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    depth_write: true,
                    bias: wgpu::DepthBiasState::default(),
                },
            ),
            plot_background: create_pipeline(
                gpu,
                &layout,
                plot("plot background pipeline", wgpu::PrimitiveTopology::TriangleList),
            ),
            plot_lines: create_pipeline(
                gpu,
                &layout,
                plot("plot line pipeline", wgpu::PrimitiveTopology::LineStrip),
            ),
        }
    })
}

impl<'window> PresentTarget<'window> {
    fn new(gpu: &GpuContext, surface: wgpu::Surface<'window>, width: u32, height: u32, source: &wgpu::TextureView) -> Result<Self> {
        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| Error::Gpu("Surface is not supported by the adapter".to_string()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);

        let bind_group_layout = gpu.create_bind_group_layout(
            "blit bind group layout",
            &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        );
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit sampler"),
            ..Default::default()
        });
        let pipeline = gpu.validated("blit pipeline", |gpu| {
            let module = gpu.create_shader_module("blit shader", shaders::BLIT);
            let layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("blit pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("blit pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_blit",
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_blit",
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        })?;
        let bind_group = Self::bind_source(gpu, &bind_group_layout, &sampler, source);

        Ok(Self {
            surface,
            config,
            pipeline,
            bind_group_layout,
            sampler,
            bind_group,
        })
    }

    fn bind_source(gpu: &GpuContext, layout: &wgpu::BindGroupLayout, sampler: &wgpu::Sampler, source: &wgpu::TextureView) -> wgpu::BindGroup {
        gpu.create_bind_group(
            "blit bind group",
            layout,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        )
    }

    fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32, source: &wgpu::TextureView) {
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&gpu.device, &self.config);
        self.bind_group = Self::bind_source(gpu, &self.bind_group_layout, &self.sampler, source);
    }

    fn present(&mut self, gpu: &GpuContext) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                self.surface.configure(&gpu.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(Error::Gpu(format!("Failed to get surface texture: {:?}", e))),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blit encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl<'window> WgpuBackend<'window> {
    /// Backend presenting to `window`
    pub async fn new(window: &'window Window) -> Result<Self> {
        let instance = GpuContext::create_instance();
        let surface = instance
            .create_surface(window)
            .map_err(|e| Error::Window(format!("Failed to create surface: {:?}", e)))?;
        let gpu = GpuContext::from_instance(instance, Some(&surface)).await?;
        let size = window.inner_size();
        Self::build(gpu, Some(surface), size.width.max(1), size.height.max(1))
    }

    /// Backend rendering only into its offscreen target
    pub async fn offscreen(width: u32, height: u32) -> Result<Self> {
        let gpu = GpuContext::new().await?;
        Self::build(gpu, None, width.max(1), height.max(1))
    }

    fn build(gpu: GpuContext, surface: Option<wgpu::Surface<'window>>, width: u32, height: u32) -> Result<Self> {
        let scene_layout = gpu.create_bind_group_layout(
            "scene bind group layout",
            &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        );
        let uniform_buffer = gpu.create_buffer(
            "scene uniforms",
            std::mem::size_of::<SceneUniforms>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let scene_bind_group = gpu.create_bind_group(
            "scene bind group",
            &scene_layout,
            &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        );
        let pipelines = create_pipelines(&gpu, &scene_layout)?;
        let targets = RenderTargets::new(&gpu, width, height);
        let present = match surface {
            Some(surface) => Some(PresentTarget::new(&gpu, surface, width, height, &targets.color_view)?),
            None => None,
        };
        let readback = gpu.create_buffer(
            "pixel readback",
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );

        log::info!("wgpu backend ready ({}x{})", width, height);
        Ok(Self {
            gpu,
            present,
            targets,
            size: (width, height),
            pipelines,
            uniform_buffer,
            scene_bind_group,
            readback,
            buffers: Vec::new(),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    fn slot(&self, handle: BufferHandle) -> Result<&GpuBuffer> {
        self.buffers
            .get(handle.0 as usize)
            .ok_or_else(|| Error::Gpu(format!("Unknown buffer {:?}", handle)))
    }

    fn slot_mut(&mut self, handle: BufferHandle) -> Result<&mut GpuBuffer> {
        self.buffers
            .get_mut(handle.0 as usize)
            .ok_or_else(|| Error::Gpu(format!("Unknown buffer {:?}", handle)))
    }

    fn encode_frame(&self, frame: &Frame) -> Result<wgpu::CommandBuffer> {
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("scene encoder"),
        });
        {
            let [r, g, b] = frame.clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.scene_bind_group, &[]);

            'draws: for draw in &frame.draws {
                let mut vertex_buffers = Vec::with_capacity(draw.vertex_buffers.len());
                for &handle in &draw.vertex_buffers {
                    match &self.slot(handle)?.buffer {
                        Some(buffer) => vertex_buffers.push(buffer),
                        None => {
                            log::debug!("Skipping {:?} draw, buffer {:?} is empty", draw.program, handle);
                            continue 'draws;
                        }
                    }
                }

                pass.set_pipeline(self.pipelines.get(draw.program));
                for (slot, buffer) in vertex_buffers.into_iter().enumerate() {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                match draw.index_buffer {
                    Some(handle) => {
                        let Some(indices) = &self.slot(handle)?.buffer else {
                            continue;
                        };
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(draw.elements.clone(), 0, draw.instances.clone());
                    }
                    None => pass.draw(draw.elements.clone(), draw.instances.clone()),
                }
            }
        }
        Ok(encoder.finish())
    }
}

impl GraphicsBackend for WgpuBackend<'_> {
    fn create_buffer(&mut self, label: &str, usage: BufferUsage) -> Result<BufferHandle> {
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;
        let handle = BufferHandle(self.buffers.len() as u32);
        self.buffers.push(GpuBuffer {
            label: label.to_string(),
            usage,
            buffer: None,
            capacity: 0,
        });
        Ok(handle)
    }

    fn allocate_buffer(&mut self, handle: BufferHandle, size: u64) -> Result<()> {
        let slot = self.slot(handle)?;
        if size == 0 || slot.capacity >= size {
            return Ok(());
        }
        let aligned = size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.gpu.create_buffer(&slot.label, aligned, slot.usage);
        log::debug!("Allocated {} bytes for {}", aligned, slot.label);
        let slot = self.slot_mut(handle)?;
        slot.buffer = Some(buffer);
        slot.capacity = aligned;
        Ok(())
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let slot = self.slot(handle)?;
        let end = offset + data.len() as u64;
        let buffer = match &slot.buffer {
            Some(buffer) if end <= slot.capacity => buffer,
            _ => {
                return Err(Error::Gpu(format!(
                    "Write of {}..{} exceeds {} ({} bytes)",
                    offset, end, slot.label, slot.capacity
                )))
            }
        };
        self.gpu.queue.write_buffer(buffer, offset, data);
        Ok(())
    }

    fn write_uniforms(&mut self, uniforms: &SceneUniforms) -> Result<()> {
        self.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        Ok(())
    }

    fn submit_frame(&mut self, frame: &Frame) -> Result<()> {
        let commands = self.encode_frame(frame)?;
        self.gpu.queue.submit(std::iter::once(commands));
        if let Some(present) = &mut self.present {
            present.present(&self.gpu)?;
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || (width, height) == self.size {
            return Ok(());
        }
        self.targets = RenderTargets::new(&self.gpu, width, height);
        if let Some(present) = &mut self.present {
            present.resize(&self.gpu, width, height, &self.targets.color_view);
        }
        self.size = (width, height);
        log::debug!("Resized render targets to {}x{}", width, height);
        Ok(())
    }
}

impl PixelSource for WgpuBackend<'_> {
    fn read_pixel(&mut self, x: u32, y: u32) -> Result<Color3> {
        let (width, height) = self.size;
        if x >= width || y >= height {
            return Err(Error::InvalidInput(format!(
                "Pixel ({}, {}) is outside the {}x{} target",
                x, y, width, height
            )));
        }

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pixel readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.targets.color,
                mip_level: 0,
                // texture rows run top to bottom
                origin: wgpu::Origin3d {
                    x,
                    y: height - 1 - y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.readback.slice(..4);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = sender.send(v);
        });
        let _ = self.gpu.device.poll(wgpu::Maintain::Wait);

        match pollster::block_on(receiver.receive()) {
            Some(Ok(())) => {
                let rgba: [u8; 4] = {
                    let data = buffer_slice.get_mapped_range();
                    [data[0], data[1], data[2], data[3]]
                };
                self.readback.unmap();
                Ok([
                    rgba[0] as f32 / 255.0,
                    rgba[1] as f32 / 255.0,
                    rgba[2] as f32 / 255.0,
                ])
            }
            Some(Err(e)) => Err(Error::Gpu(format!("Failed to map readback buffer: {}", e))),
            None => Err(Error::Gpu("Readback channel closed".to_string())),
        }
    }
}
