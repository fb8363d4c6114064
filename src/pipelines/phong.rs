//! Final shading pass.
//!
//! Standard forward draw to the surface with depth testing, pulling the
//! shadow map, the radiance pyramid and the raw voxel buffers alongside the
//! per-material and per-mesh groups. All debug views and shading toggles
//! live in the shade uniform so switching them never rebuilds pipelines;
//! only wireframe needs its own pipeline variant.

use crate::capabilities::Capabilities;
use crate::data_structures::model::MeshVertex;
use crate::data_structures::texture::Texture;
use crate::data_structures::volume::VoxelVolumes;
use crate::pipelines::{PassLayouts, shadow::light_space_matrix};
use crate::scene::{Light, Scene};
use crate::settings::{RenderSettings, VoxelConfig};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadeUniform {
    pub light_space: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    pub _pad0: f32,
    pub light_intensity: [f32; 3],
    pub ambient_scale: f32,
    pub voxel_dim: u32,
    pub voxel_levels: u32,
    pub mip_level: i32,
    pub vct_steps: i32,
    pub enable_shadows: u32,
    pub enable_normal_map: u32,
    pub enable_indirect: u32,
    pub enable_diffuse: u32,
    pub enable_specular: u32,
    pub draw_normals: u32,
    pub draw_dominant_axis: u32,
    pub draw_voxels: u32,
    pub draw_radiance: u32,
    pub vct_bias: f32,
    pub vct_cone_angle: f32,
    pub vct_cone_initial_height: f32,
    pub vct_lod_offset: f32,
    pub world_extent: f32,
    pub _pad1: [f32; 2],
}

impl ShadeUniform {
    pub fn new(config: &VoxelConfig, settings: &RenderSettings, light: &Light) -> Self {
        Self {
            light_space: light_space_matrix(light).into(),
            light_position: light.position.into(),
            _pad0: 0.0,
            light_intensity: light.intensity.into(),
            ambient_scale: settings.ambient_scale,
            voxel_dim: config.dim,
            voxel_levels: config.levels,
            mip_level: settings.mip_level,
            vct_steps: settings.vct_steps,
            enable_shadows: settings.enable_shadows as u32,
            enable_normal_map: settings.enable_normal_map as u32,
            enable_indirect: settings.enable_indirect as u32,
            enable_diffuse: settings.enable_diffuse as u32,
            enable_specular: settings.enable_specular as u32,
            draw_normals: settings.draw_normals as u32,
            draw_dominant_axis: settings.draw_dominant_axis as u32,
            draw_voxels: settings.draw_voxels as u32,
            draw_radiance: settings.draw_radiance as u32,
            vct_bias: settings.vct_bias,
            vct_cone_angle: settings.vct_cone_angle,
            vct_cone_initial_height: settings.vct_cone_initial_height,
            vct_lod_offset: settings.vct_lod_offset,
            world_extent: config.world_extent,
            _pad1: [0.0; 2],
        }
    }
}

pub struct PhongPass {
    pipeline: wgpu::RenderPipeline,
    /// Line-polygon variant, when the device can rasterize lines.
    wireframe_pipeline: Option<wgpu::RenderPipeline>,
    shade_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    resources_bind_group: wgpu::BindGroup,
}

impl PhongPass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        caps: &Capabilities,
        layouts: &PassLayouts,
        volumes: &VoxelVolumes,
        shadow_view: &wgpu::TextureView,
        shadow_sampler: &wgpu::Sampler,
        camera_buffer: &wgpu::Buffer,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform_entry(0), uniform_entry(1)],
            label: Some("shade_frame_bind_group_layout"),
        });

        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let resources_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Depth,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D3,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                storage_entry(4),
                storage_entry(5),
            ],
            label: Some("shade_resources_bind_group_layout"),
        });

        let shade_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shade Uniform Buffer"),
            size: std::mem::size_of::<ShadeUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: shade_buffer.as_entire_binding(),
                },
            ],
            label: Some("shade frame bind group"),
        });

        let resources_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &resources_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&volumes.radiance_full_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&volumes.radiance_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: volumes.color.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: volumes.normal.as_entire_binding(),
                },
            ],
            label: Some("shade resources bind group"),
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Phong Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("phong.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Phong Pipeline Layout"),
            bind_group_layouts: &[
                &frame_layout,
                &resources_layout,
                &layouts.material,
                &layouts.model,
            ],
            push_constant_ranges: &[],
        });

        let mk_pipeline = |polygon_mode| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some("Phong Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[MeshVertex::desc()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: Texture::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };

        let pipeline = mk_pipeline(wgpu::PolygonMode::Fill);
        let wireframe_pipeline = caps
            .polygon_mode_line
            .then(|| mk_pipeline(wgpu::PolygonMode::Line));

        Self {
            pipeline,
            wireframe_pipeline,
            shade_buffer,
            frame_bind_group,
            resources_bind_group,
        }
    }

    pub fn prepare(
        &self,
        queue: &wgpu::Queue,
        config: &VoxelConfig,
        settings: &RenderSettings,
        light: &Light,
    ) {
        let uniform = ShadeUniform::new(config, settings, light);
        queue.write_buffer(&self.shade_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        scene: &Scene,
        settings: &RenderSettings,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Phong Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.01,
                        g: 0.01,
                        b: 0.01,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let pipeline = match &self.wireframe_pipeline {
            Some(wireframe) if settings.wireframe => wireframe,
            _ => &self.pipeline,
        };
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
        render_pass.set_bind_group(1, &self.resources_bind_group, &[]);

        for mesh in scene.meshes() {
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_bind_group(3, &mesh.model_bind_group, &[]);
            for drawable in &mesh.drawables {
                render_pass.set_bind_group(
                    2,
                    &mesh.materials[drawable.material_id].bind_group,
                    &[],
                );
                render_pass.set_index_buffer(
                    drawable.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(0..drawable.num_elements, 0, 0..1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    #[test]
    fn shade_uniform_size_matches_its_shader_block() {
        // mat4 + 2 vec4 rows + 20 scalar words.
        assert_eq!(std::mem::size_of::<ShadeUniform>(), 64 + 32 + 80);
        assert_eq!(std::mem::size_of::<ShadeUniform>() % 16, 0);
    }

    #[test]
    fn shade_uniform_mirrors_settings_toggles() {
        let config = VoxelConfig::default();
        let mut settings = RenderSettings::default();
        settings.enable_indirect = false;
        settings.draw_radiance = true;
        settings.mip_level = 3;
        let light = Light {
            position: Vector3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };

        let uniform = ShadeUniform::new(&config, &settings, &light);
        assert_eq!(uniform.enable_indirect, 0);
        assert_eq!(uniform.draw_radiance, 1);
        assert_eq!(uniform.mip_level, 3);
        assert_eq!(uniform.voxel_dim, config.dim);
        assert_eq!(uniform.light_position, [1.0, 2.0, 3.0]);
    }
}
