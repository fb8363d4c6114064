//! Radiance injection pass.
//!
//! Dispatched over the shadow map rather than the voxel grid, so shadow
//! resolution controls injection sample density independently of voxel
//! density. Writes only the base level of the radiance volume.

use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::volume::VoxelVolumes;
use crate::pipelines::{dispatch_size, shadow::light_space_matrix};
use crate::scene::Light;
use crate::settings::VoxelConfig;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InjectUniform {
    pub light_space_inverse: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    pub _pad0: f32,
    pub light_intensity: [f32; 3],
    pub _pad1: f32,
    pub voxel_dim: u32,
    pub shadow_dim: u32,
    pub world_extent: f32,
    pub _pad2: f32,
}

pub struct InjectPass {
    pipeline: wgpu::ComputePipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl InjectPass {
    pub fn new(
        device: &wgpu::Device,
        volumes: &VoxelVolumes,
        shadow_view: &wgpu::TextureView,
    ) -> Self {
        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Depth,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: VoxelVolumes::RADIANCE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
                storage_entry(3),
                storage_entry(4),
            ],
            label: Some("inject_bind_group_layout"),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Inject Uniform Buffer"),
            size: std::mem::size_of::<InjectUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&volumes.radiance_mip_views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: volumes.color.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: volumes.normal.as_entire_binding(),
                },
            ],
            label: Some("inject bind group"),
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Inject Radiance Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("inject_radiance.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Inject Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Inject Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }

    pub fn prepare(&self, queue: &wgpu::Queue, config: &VoxelConfig, light: &Light) {
        let light_space = light_space_matrix(light);
        // Orthographic view-projections are always invertible.
        let inverse = light_space.invert().unwrap_or_else(Matrix4::identity);
        let uniform = InjectUniform {
            light_space_inverse: inverse.into(),
            light_position: light.position.into(),
            _pad0: 0.0,
            light_intensity: light.intensity.into(),
            _pad1: 0.0,
            voxel_dim: config.dim,
            shadow_dim: config.shadow_dim,
            world_extent: config.world_extent,
            _pad2: 0.0,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, config: &VoxelConfig) {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Inject Radiance"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&self.pipeline);
        compute_pass.set_bind_group(0, &self.bind_group, &[]);
        let groups = dispatch_size(config.shadow_dim, 16);
        compute_pass.dispatch_workgroups(groups, groups, 1);
    }
}
