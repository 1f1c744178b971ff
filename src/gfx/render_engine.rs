use std::{iter, sync::Arc};

use wgpu::{PresentMode, RenderPipeline, TextureFormat};

use super::{palette::Palette, resources::TextureResource};
use crate::error::{EtherError, Result};
use crate::simulation::{
    field::{GridSize, VelocityField},
    gpu::next_allocation_id,
    traits::FieldView,
};
use crate::wgpu_utils::{self, UniformBuffer};

/// Background the palette is mixed over, RGBA
pub const BACKGROUND: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositeUniform {
    pub bg_color: [f32; 4],
    pub field_size: [u32; 2],
    pub _pad: [u32; 2],
}

impl CompositeUniform {
    pub fn new(size: GridSize) -> Self {
        Self {
            bg_color: BACKGROUND,
            field_size: [size.width as u32, size.height as u32],
            _pad: [0; 2],
        }
    }
}

/// Prefer a non-sRGB format so palette bytes reach the screen unconverted
pub fn choose_surface_format(formats: &[TextureFormat]) -> Option<TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|f| !f.is_srgb())
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(modes: &[PresentMode]) -> PresentMode {
    modes
        .iter()
        .copied()
        .find(|mode| *mode == PresentMode::Mailbox)
        .or_else(|| modes.iter().copied().find(|mode| *mode == PresentMode::Fifo))
        .or_else(|| modes.first().copied())
        .unwrap_or(PresentMode::Fifo)
}

/// Storage copy of a CPU-side field
struct FieldUpload {
    buffer: wgpu::Buffer,
    size: GridSize,
    allocation: u64,
}

pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    pipeline: RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    /// Rebuilt whenever the bound field buffer is reallocated
    bind_group: Option<(u64, wgpu::BindGroup)>,
    uniform: UniformBuffer<CompositeUniform>,
    palette_texture: TextureResource,
    upload: Option<FieldUpload>,
    /// Reused every frame to avoid reallocating the upload
    staging: Vec<[f32; 2]>,
}

impl RenderEngine {
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        palette: &Palette,
    ) -> Result<RenderEngine> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Etherflow Device"),
                required_features: wgpu::Features::default(),
                // Downlevel storage limits already cover a 4096x4096 velocity grid
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let capabilities = surface.get_capabilities(&adapter);
        let format =
            choose_surface_format(&capabilities.formats).ok_or(EtherError::NoSurfaceFormat)?;
        let alpha_mode = capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: choose_present_mode(&capabilities.present_modes),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let palette_texture = TextureResource::create_palette_texture(&device, &queue, palette);
        let uniform =
            UniformBuffer::new_with_data(&device, &CompositeUniform::new(GridSize::new(1, 1)));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu_utils::uniform(),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu_utils::storage_buffer(true),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu_utils::texture_2d(),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu_utils::sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("composite.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Composite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
                unclipped_depth: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        Ok(RenderEngine {
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
            pipeline,
            bind_group_layout,
            bind_group: None,
            uniform,
            palette_texture,
            upload: None,
            staging: Vec::new(),
        })
    }

    /// Device shared with the GPU solver
    pub fn device(&self) -> Arc<wgpu::Device> {
        self.device.clone()
    }

    pub fn queue(&self) -> Arc<wgpu::Queue> {
        self.queue.clone()
    }

    /// Copy a CPU field into the upload buffer, reallocating it when the grid changed
    fn upload_field(&mut self, field: &VelocityField) {
        let size = field.size();
        if !matches!(&self.upload, Some(upload) if upload.size == size) {
            log::debug!("Reallocating field upload at {}x{}", size.width, size.height);
            self.upload = Some(FieldUpload {
                buffer: self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Velocity Upload"),
                    size: size.cells() as u64 * 8,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                size,
                allocation: next_allocation_id(),
            });
        }

        self.staging.clear();
        self.staging.extend(field.data().iter().map(|v| [v.x, v.y]));
        if let Some(upload) = self.upload.as_ref() {
            self.queue
                .write_buffer(&upload.buffer, 0, bytemuck::cast_slice(&self.staging));
        }
    }

    /// Point the composite pass at `field`
    fn bind_field(&mut self, field: FieldView<'_>) {
        if let FieldView::Cpu(velocity) = field {
            self.upload_field(velocity);
        }
        let (buffer, size, allocation) = match field {
            FieldView::Gpu(gpu) => (gpu.buffer, gpu.size, gpu.allocation),
            FieldView::Cpu(_) => match self.upload.as_ref() {
                Some(upload) => (&upload.buffer, upload.size, upload.allocation),
                None => return,
            },
        };
        self.uniform
            .update_content(&self.queue, CompositeUniform::new(size));
        if self.bind_group.as_ref().is_some_and(|(bound, _)| *bound == allocation) {
            return;
        }
        let bind_group = create_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.uniform,
            buffer,
            &self.palette_texture,
        );
        self.bind_group = Some((allocation, bind_group));
    }

    /// Composite `field` to the surface.
    ///
    /// A GPU field is bound in place; a CPU field is uploaded first. A lost or
    /// outdated surface is reconfigured and the frame skipped; any other
    /// surface error is logged and the frame skipped.
    pub fn render_frame(&mut self, field: FieldView<'_>) {
        self.bind_field(field);
        let Some((_, bind_group)) = self.bind_group.as_ref() else {
            return;
        };

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(err) => {
                log::error!("Skipping frame: {}", err);
                return;
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Composite Encoder"),
            });

        {
            let [r, g, b, a] = BACKGROUND.map(f64::from);
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.queue.submit(iter::once(encoder.finish()));
        surface_texture.present();
    }

    /// Reconfigure for a new physical size; zero sizes are ignored
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &UniformBuffer<CompositeUniform>,
    field: &wgpu::Buffer,
    palette: &TextureResource,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Composite Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.binding_resource(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: field.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&palette.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(&palette.sampler),
            },
        ],
    })
}
