//! Shadow map pass: scene depth from the mainlight.
//!
//! Front faces are culled so the stored depth comes from back surfaces,
//! which keeps shadow acne off front surfaces without a depth bias.

use cgmath::{EuclideanSpace, Matrix4, Point3, Vector3, ortho};

use crate::camera::OPENGL_TO_WGPU_MATRIX;
use crate::data_structures::model::MeshVertex;
use crate::data_structures::texture::Texture;
use crate::pipelines::PassLayouts;
use crate::scene::{Light, Scene};

/// Half extent of the light's orthographic frustum in world units.
const LIGHT_ORTHO_EXTENT: f32 = 25.0;
const LIGHT_NEAR: f32 = 0.0;
const LIGHT_FAR: f32 = 100.0;

/// World-to-light-clip transform for a directional mainlight.
pub fn light_space_matrix(light: &Light) -> Matrix4<f32> {
    let projection = ortho(
        -LIGHT_ORTHO_EXTENT,
        LIGHT_ORTHO_EXTENT,
        -LIGHT_ORTHO_EXTENT,
        LIGHT_ORTHO_EXTENT,
        LIGHT_NEAR,
        LIGHT_FAR,
    );
    let position = Point3::from_vec(light.position);
    let view = Matrix4::look_at_rh(
        position,
        position + light.direction,
        Vector3::new(0.0, 1.0, 0.0),
    );
    OPENGL_TO_WGPU_MATRIX * projection * view
}

pub struct ShadowPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device, layouts: &PassLayouts) -> Self {
        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("shadow_light_bind_group_layout"),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Light Buffer"),
            size: std::mem::size_of::<[[f32; 4]; 4]>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &light_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("shadow light bind group"),
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shadow.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&light_layout, &layouts.model],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            cache: None,
            label: Some("Shadow Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[MeshVertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Front),
                polygon_mode: wgpu::PolygonMode::Fill,
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
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }

    pub fn prepare(&self, queue: &wgpu::Queue, light: &Light) {
        let matrix: [[f32; 4]; 4] = light_space_matrix(light).into();
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[matrix]));
    }

    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        shadow_map: &wgpu::TextureView,
        scene: &Scene,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: shadow_map,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        for mesh in scene.meshes() {
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_bind_group(1, &mesh.model_bind_group, &[]);
            for drawable in &mesh.drawables {
                render_pass.set_index_buffer(drawable.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..drawable.num_elements, 0, 0..1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector4;

    #[test]
    fn light_space_depth_increases_away_from_the_light() {
        let light = Light {
            position: Vector3::new(0.0, 30.0, 0.0),
            direction: Vector3::new(0.0, -1.0, 0.0),
            intensity: Vector3::new(1.0, 1.0, 1.0),
        };
        let m = light_space_matrix(&light);
        let project = |p: Vector3<f32>| {
            let clip = m * Vector4::new(p.x, p.y, p.z, 1.0);
            clip.z / clip.w
        };
        let near = project(Vector3::new(0.0, 25.0, 0.0));
        let far = project(Vector3::new(0.0, 0.0, 0.0));
        assert!(near < far, "{} >= {}", near, far);
        // Both fall inside wgpu's 0..1 depth range.
        assert!((0.0..=1.0).contains(&near));
        assert!((0.0..=1.0).contains(&far));
    }
}
