//! Voxelization pass: rasterize the scene into the voxel color/normal grid.
//!
//! Runs with culling off and the color target write-masked away so every
//! surface contributes regardless of occlusion or winding; the only output
//! is the atomic accumulation into the voxel buffers. The accumulation
//! shader variant is chosen once from the capability descriptor, and the
//! packed variant is followed by a normalization dispatch every frame.

use cgmath::{Matrix4, Point3, Vector3, ortho};
use wgpu::util::DeviceExt;

use crate::camera::OPENGL_TO_WGPU_MATRIX;
use crate::capabilities::Capabilities;
use crate::data_structures::volume::VoxelVolumes;
use crate::pipelines::{PassLayouts, dispatch_size};
use crate::scene::Scene;
use crate::settings::RenderSettings;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VoxelizeUniform {
    pub mvp_x: [[f32; 4]; 4],
    pub mvp_y: [[f32; 4]; 4],
    pub mvp_z: [[f32; 4]; 4],
    pub axis_override: i32,
    pub voxel_dim: u32,
    pub world_extent: f32,
    pub _padding: f32,
}

/// One orthographic view-projection per world axis, looking inward from
/// `extent` away. The Y matrix uses a -Z up vector; a Y up vector would be
/// parallel to the view direction and degenerate.
pub fn axis_matrices(extent: f32) -> [Matrix4<f32>; 3] {
    let projection = OPENGL_TO_WGPU_MATRIX * ortho(-extent, extent, -extent, extent, 0.0, 2.0 * extent);
    let center = Point3::new(0.0, 0.0, 0.0);
    let x = Matrix4::look_at_rh(
        Point3::new(extent, 0.0, 0.0),
        center,
        Vector3::new(0.0, 1.0, 0.0),
    );
    let y = Matrix4::look_at_rh(
        Point3::new(0.0, extent, 0.0),
        center,
        Vector3::new(0.0, 0.0, -1.0),
    );
    let z = Matrix4::look_at_rh(
        Point3::new(0.0, 0.0, extent),
        center,
        Vector3::new(0.0, 1.0, 0.0),
    );
    [projection * x, projection * y, projection * z]
}

struct NormalizePass {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
}

pub struct VoxelizePass {
    pipeline: wgpu::RenderPipeline,
    /// Same pipeline with conservative rasterization on, when the device has it.
    conservative_pipeline: Option<wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    target_bind_group: wgpu::BindGroup,
    /// Present on the packed accumulation path only.
    normalize: Option<NormalizePass>,
}

impl VoxelizePass {
    pub fn new(
        device: &wgpu::Device,
        caps: &Capabilities,
        layouts: &PassLayouts,
        volumes: &VoxelVolumes,
    ) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("voxelize_frame_bind_group_layout"),
        });

        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let target_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[storage_entry(0), storage_entry(1)],
            label: Some("voxelize_target_bind_group_layout"),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxelize Uniform Buffer"),
            size: std::mem::size_of::<VoxelizeUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("voxelize frame bind group"),
        });

        let target_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &target_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: volumes.color.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: volumes.normal.as_entire_binding(),
                },
            ],
            label: Some("voxelize target bind group"),
        });

        let accumulate_source = if caps.atomic_float32 {
            include_str!("voxelize_f32.wgsl")
        } else {
            include_str!("voxelize_u32.wgsl")
        };
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Voxelize Shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{}\n{}", include_str!("voxelize.wgsl"), accumulate_source).into(),
            ),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Voxelize Pipeline Layout"),
            bind_group_layouts: &[
                &frame_layout,
                &target_layout,
                &layouts.material,
                &layouts.voxel_geometry,
            ],
            push_constant_ranges: &[],
        });

        let mk_pipeline = |conservative: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some("Voxelize Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    // Geometry is pulled from storage bindings.
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        blend: None,
                        write_mask: wgpu::ColorWrites::empty(),
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
                    conservative,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };

        let pipeline = mk_pipeline(false);
        let conservative_pipeline = caps.conservative_rasterization.then(|| mk_pipeline(true));

        let normalize = (!caps.atomic_float32).then(|| {
            let normalize_uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Normalize Uniform Buffer"),
                contents: bytemuck::cast_slice(&[volumes.config.dim, 0, 0, 0]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
                label: Some("normalize_bind_group_layout"),
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: volumes.color.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: volumes.normal.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: normalize_uniform.as_entire_binding(),
                    },
                ],
                label: Some("normalize bind group"),
            });
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Normalize Voxels Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("normalize_voxels.wgsl").into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Normalize Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Normalize Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("cs_main"),
                compilation_options: Default::default(),
                cache: None,
            });
            NormalizePass {
                pipeline,
                bind_group,
            }
        });

        Self {
            pipeline,
            conservative_pipeline,
            uniform_buffer,
            frame_bind_group,
            target_bind_group,
            normalize,
        }
    }

    /// Upload the per-frame uniform.
    pub fn prepare(&self, queue: &wgpu::Queue, volumes: &VoxelVolumes, settings: &RenderSettings) {
        let extent = volumes.config.world_extent;
        let [mvp_x, mvp_y, mvp_z] = axis_matrices(extent);
        let uniform = VoxelizeUniform {
            mvp_x: mvp_x.into(),
            mvp_y: mvp_y.into(),
            mvp_z: mvp_z.into(),
            axis_override: settings.axis_override,
            voxel_dim: volumes.config.dim,
            world_extent: extent,
            _padding: 0.0,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// Record the voxelization render pass over the whole scene, plus the
    /// normalization dispatch on the packed path.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        volumes: &VoxelVolumes,
        scene: &Scene,
        settings: &RenderSettings,
    ) {
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Voxelize Scene"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &volumes.raster_target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let pipeline = match &self.conservative_pipeline {
                Some(conservative) if settings.conservative_rasterization => conservative,
                _ => &self.pipeline,
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
            render_pass.set_bind_group(1, &self.target_bind_group, &[]);

            for mesh in scene.meshes() {
                for drawable in &mesh.drawables {
                    render_pass.set_bind_group(
                        2,
                        &mesh.materials[drawable.material_id].bind_group,
                        &[],
                    );
                    render_pass.set_bind_group(3, &drawable.voxel_bind_group, &[]);
                    render_pass.draw(0..drawable.num_elements, 0..1);
                }
            }
        }

        if let Some(normalize) = &self.normalize {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Normalize Voxels"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&normalize.pipeline);
            compute_pass.set_bind_group(0, &normalize.bind_group, &[]);
            let groups = dispatch_size(volumes.config.dim, 4);
            compute_pass.dispatch_workgroups(groups, groups, groups);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector4;

    fn ndc(m: &Matrix4<f32>, p: [f32; 3]) -> Vector3<f32> {
        let clip = m * Vector4::new(p[0], p[1], p[2], 1.0);
        Vector3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn axis_matrices_cover_the_grid_volume() {
        let extent = 20.0;
        for m in &axis_matrices(extent) {
            // Center of the grid sits mid-depth on every axis.
            let center = ndc(m, [0.0, 0.0, 0.0]);
            assert!((center.z - 0.5).abs() < 1e-4);

            // All corners of the covered cube stay inside the clip volume
            // (x/y in -1..1, z in 0..1 for wgpu).
            for corner in 0..8 {
                let p = [
                    if corner & 1 == 0 { -extent } else { extent },
                    if corner & 2 == 0 { -extent } else { extent },
                    if corner & 4 == 0 { -extent } else { extent },
                ];
                let v = ndc(m, p);
                assert!(v.x.abs() <= 1.0 + 1e-4 && v.y.abs() <= 1.0 + 1e-4);
                assert!((-1e-4..=1.0 + 1e-4).contains(&v.z), "corner {:?} -> {:?}", p, v);
            }
        }
    }

    // Mirror of the shader's per-triangle axis choice: the axis with the
    // largest absolute face-normal component.
    fn dominant_axis(p0: Vector3<f32>, p1: Vector3<f32>, p2: Vector3<f32>) -> usize {
        let n = (p1 - p0).cross(p2 - p0);
        let a = [n.x.abs(), n.y.abs(), n.z.abs()];
        if a[0] >= a[1] && a[0] >= a[2] {
            0
        } else if a[1] >= a[2] {
            1
        } else {
            2
        }
    }

    #[test]
    fn dominant_axis_maximizes_projected_area() {
        use cgmath::Vector3 as V;
        // A triangle in the YZ plane projects largest along X.
        assert_eq!(
            dominant_axis(V::new(0.0, 0.0, 0.0), V::new(0.0, 1.0, 0.0), V::new(0.0, 0.0, 1.0)),
            0
        );
        // Floor triangle: Y.
        assert_eq!(
            dominant_axis(V::new(0.0, 0.0, 0.0), V::new(1.0, 0.0, 0.0), V::new(0.0, 0.0, 1.0)),
            1
        );
        // A wall facing mostly -Z with a slight tilt still picks Z.
        assert_eq!(
            dominant_axis(V::new(0.0, 0.0, 0.0), V::new(1.0, 0.1, 0.0), V::new(0.0, 1.0, 0.1)),
            2
        );
    }

    #[test]
    fn axis_matrices_look_along_distinct_axes() {
        let [x, y, z] = axis_matrices(10.0);
        // A point displaced along the viewing axis only changes depth.
        let base = ndc(&x, [0.0, 0.0, 0.0]);
        let moved = ndc(&x, [5.0, 0.0, 0.0]);
        assert!((moved.x - base.x).abs() < 1e-4 && (moved.y - base.y).abs() < 1e-4);
        assert!((moved.z - base.z).abs() > 1e-3);

        let base = ndc(&y, [0.0, 0.0, 0.0]);
        let moved = ndc(&y, [0.0, 5.0, 0.0]);
        assert!((moved.x - base.x).abs() < 1e-4 && (moved.y - base.y).abs() < 1e-4);

        let base = ndc(&z, [0.0, 0.0, 0.0]);
        let moved = ndc(&z, [0.0, 0.0, 5.0]);
        assert!((moved.x - base.x).abs() < 1e-4 && (moved.y - base.y).abs() < 1e-4);
    }
}
