//! wgpu-backed GPU state: buffers, pipelines and the [`ComputeBackend`]
//! implementation the orchestrators drive.
//!
//! Dispatches are recorded into a pending command encoder and only reach
//! the queue when [`ComputeBackend::barrier`] is called. Submission is the
//! synchronization point here: queued buffer writes apply at the start of
//! the next submit, so a missing barrier between dispatches would let a
//! later parameter upload clobber the values an un-submitted dispatch was
//! recorded against.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{ComputeBackend, DispatchParams, SyncIntent};
use crate::error::GpuError;
use crate::particle::ParticlePool;
use crate::region::PolygonFace;
use crate::shader::{
    self, FACE_BINDING, PARTICLE_BINDING, RAND_SEED_BINDING, RESET_COUNTER_BINDING,
    UNIFORM_BINDING,
};

/// GPU-side mirror of [`DispatchParams`], laid out to match the WGSL
/// `DispatchUniforms` struct field for field.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct DispatchUniforms {
    region_transform: [[f32; 4]; 4],
    emitter_transform: [[f32; 4]; 4],
    point_center: [f32; 4],
    bar_start: [f32; 4],
    bar_end: [f32; 4],
    bar_emit_dir: [f32; 4],
    max_particle_count: u32,
    max_emit_count: u32,
    use_point_emitter: u32,
    only_reset: u32,
    min_velocity: f32,
    delta_velocity: f32,
    delta_time: f32,
    _pad: f32,
}

impl From<&DispatchParams> for DispatchUniforms {
    fn from(p: &DispatchParams) -> Self {
        Self {
            region_transform: p.region_transform.to_cols_array_2d(),
            emitter_transform: p.emitter_transform.to_cols_array_2d(),
            point_center: p.point_center.to_array(),
            bar_start: p.bar_start.to_array(),
            bar_end: p.bar_end.to_array(),
            bar_emit_dir: p.bar_emit_dir.to_array(),
            max_particle_count: p.max_particle_count,
            max_emit_count: p.max_emit_count,
            use_point_emitter: p.use_point_emitter as u32,
            only_reset: p.only_reset as u32,
            min_velocity: p.min_velocity,
            delta_velocity: p.delta_velocity,
            delta_time: p.delta_time,
            _pad: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct RenderUniforms {
    transform: [[f32; 4]; 4],
}

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    compute_pipeline: wgpu::ComputePipeline,
    particle_pipeline: wgpu::RenderPipeline,
    region_pipeline: wgpu::RenderPipeline,
    particle_buffer: wgpu::Buffer,
    face_buffer: wgpu::Buffer,
    dispatch_uniform_buffer: wgpu::Buffer,
    render_uniform_buffer: wgpu::Buffer,
    reset_counter_buffer: wgpu::Buffer,
    rand_seed_buffer: wgpu::Buffer,
    compute_bind_group: wgpu::BindGroup,
    render_bind_group: wgpu::BindGroup,
    num_particles: u32,
    num_region_vertices: u32,
    pending: Option<wgpu::CommandEncoder>,
}

impl GpuState {
    pub async fn new(
        window: Arc<Window>,
        pool: &ParticlePool,
        faces: &[PolygonFace],
    ) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: pool.as_bytes(),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE,
        });

        let face_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Polygon Face Buffer"),
            contents: crate::region::face_bytes(faces),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE,
        });

        let dispatch_uniform_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Dispatch Uniform Buffer"),
                contents: bytemuck::bytes_of(&DispatchUniforms::from(&DispatchParams::default())),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let render_uniform_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Render Uniform Buffer"),
                contents: bytemuck::bytes_of(&RenderUniforms {
                    transform: Mat4::IDENTITY.to_cols_array_2d(),
                }),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let reset_counter_buffer = create_counter_buffer(&device, "Reset Counter Buffer");
        let rand_seed_buffer = create_counter_buffer(&device, "Rand Seed Buffer");

        // Compute side: particles, dispatch uniforms, faces, both counters.
        let compute_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Compute Bind Group Layout"),
                entries: &[
                    storage_layout_entry(PARTICLE_BINDING, false),
                    wgpu::BindGroupLayoutEntry {
                        binding: UNIFORM_BINDING,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage_layout_entry(FACE_BINDING, true),
                    storage_layout_entry(RESET_COUNTER_BINDING, false),
                    storage_layout_entry(RAND_SEED_BINDING, false),
                ],
            });

        let compute_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compute Bind Group"),
            layout: &compute_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: PARTICLE_BINDING,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: dispatch_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: FACE_BINDING,
                    resource: face_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: RESET_COUNTER_BINDING,
                    resource: reset_counter_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: RAND_SEED_BINDING,
                    resource: rand_seed_buffer.as_entire_binding(),
                },
            ],
        });

        let compute_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(shader::compute_shader().into()),
        });

        let compute_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Compute Pipeline Layout"),
                bind_group_layouts: &[&compute_bind_group_layout],
                push_constant_ranges: &[],
            });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Compute Pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &compute_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        // Render side: one uniform bind group shared by both pipelines.
        let render_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Render Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let render_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Render Bind Group"),
            layout: &render_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: render_uniform_buffer.as_entire_binding(),
            }],
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&render_bind_group_layout],
                push_constant_ranges: &[],
            });

        let particle_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Render Shader"),
            source: wgpu::ShaderSource::Wgsl(shader::particle_render_shader().into()),
        });

        let particle_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &particle_shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: crate::particle::Particle::SIZE as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x4,
                        },
                        wgpu::VertexAttribute {
                            offset: 32,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Uint32,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &particle_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let region_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Region Render Shader"),
            source: wgpu::ShaderSource::Wgsl(shader::region_render_shader().into()),
        });

        let region_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Region Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &region_shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: crate::region::SurfaceVertex::SIZE as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        offset: 0,
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x4,
                    }],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &region_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            compute_pipeline,
            particle_pipeline,
            region_pipeline,
            particle_buffer,
            face_buffer,
            dispatch_uniform_buffer,
            render_uniform_buffer,
            reset_counter_buffer,
            rand_seed_buffer,
            compute_bind_group,
            render_bind_group,
            num_particles: pool.capacity(),
            // Each face stores its start and end vertex back to back, which
            // is exactly one line-list segment.
            num_region_vertices: (faces.len() * 2) as u32,
            pending: None,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn flush_pending(&mut self) {
        if let Some(encoder) = self.pending.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    pub fn render(&mut self, window_transform: Mat4) -> Result<(), wgpu::SurfaceError> {
        // Any un-barriered compute work must land before vertex fetch.
        self.flush_pending();

        self.queue.write_buffer(
            &self.render_uniform_buffer,
            0,
            bytemuck::bytes_of(&RenderUniforms {
                transform: window_transform.to_cols_array_2d(),
            }),
        );

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.region_pipeline);
            render_pass.set_bind_group(0, &self.render_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.face_buffer.slice(..));
            render_pass.draw(0..self.num_region_vertices, 0..1);

            render_pass.set_pipeline(&self.particle_pipeline);
            render_pass.set_bind_group(0, &self.render_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.particle_buffer.slice(..));
            render_pass.draw(0..6, 0..self.num_particles);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl ComputeBackend for GpuState {
    fn zero_reset_counter(&mut self) {
        self.queue
            .write_buffer(&self.reset_counter_buffer, 0, bytemuck::bytes_of(&0u32));
    }

    fn seed_rand_counter(&mut self, seed: u32) {
        self.queue
            .write_buffer(&self.rand_seed_buffer, 0, bytemuck::bytes_of(&seed));
    }

    fn upload_params(&mut self, params: &DispatchParams) {
        self.queue.write_buffer(
            &self.dispatch_uniform_buffer,
            0,
            bytemuck::bytes_of(&DispatchUniforms::from(params)),
        );
    }

    fn dispatch(&mut self, work_groups: u32) {
        if self.pending.is_none() {
            self.pending = Some(self.device.create_command_encoder(
                &wgpu::CommandEncoderDescriptor {
                    label: Some("Compute Encoder"),
                },
            ));
        }
        let Some(encoder) = self.pending.as_mut() else {
            return;
        };

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Compute Pass"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&self.compute_pipeline);
        compute_pass.set_bind_group(0, &self.compute_bind_group, &[]);
        compute_pass.dispatch_workgroups(work_groups, 1, 1);
    }

    fn barrier(&mut self, _intent: SyncIntent) {
        self.flush_pending();
    }
}

fn create_counter_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(&0u32),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
    })
}

fn storage_layout_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_dispatch_uniforms_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<DispatchUniforms>(), 224);
        assert_eq!(offset_of!(DispatchUniforms, emitter_transform), 64);
        assert_eq!(offset_of!(DispatchUniforms, point_center), 128);
        assert_eq!(offset_of!(DispatchUniforms, max_particle_count), 192);
        assert_eq!(offset_of!(DispatchUniforms, delta_time), 216);
    }

    #[test]
    fn test_dispatch_uniforms_from_params() {
        let mut params = DispatchParams::default();
        params.max_particle_count = 15_000;
        params.max_emit_count = 25;
        params.use_point_emitter = true;
        params.only_reset = true;
        params.min_velocity = 0.3;
        params.delta_velocity = 0.2;

        let uniforms = DispatchUniforms::from(&params);
        assert_eq!(uniforms.max_particle_count, 15_000);
        assert_eq!(uniforms.max_emit_count, 25);
        assert_eq!(uniforms.use_point_emitter, 1);
        assert_eq!(uniforms.only_reset, 1);
        assert_eq!(uniforms.min_velocity, 0.3);
        assert_eq!(uniforms.delta_velocity, 0.2);
        assert_eq!(uniforms.delta_time, 0.0);
    }
}
