//! Mip filtering pass: build the radiance pyramid by successive halving.
//!
//! Each level runs as its own compute pass; the pass boundary is the
//! barrier that makes level L fully written before level L+1 reads it.

use crate::data_structures::volume::VoxelVolumes;
use crate::pipelines::dispatch_size;

pub struct MipmapPass {
    pipeline: wgpu::ComputePipeline,
    /// One bind group per pyramid step, reading level L and writing L+1.
    level_bind_groups: Vec<wgpu::BindGroup>,
}

impl MipmapPass {
    pub fn new(device: &wgpu::Device, volumes: &VoxelVolumes) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D3,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: VoxelVolumes::RADIANCE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
            ],
            label: Some("mipmap_bind_group_layout"),
        });

        let level_bind_groups = (0..volumes.config.levels as usize)
            .map(|level| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(
                                &volumes.radiance_mip_views[level],
                            ),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(
                                &volumes.radiance_mip_views[level + 1],
                            ),
                        },
                    ],
                    label: Some(&format!("mipmap bind group level {}", level)),
                })
            })
            .collect();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Filter Radiance Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("filter_radiance.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mipmap Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Mipmap Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            level_bind_groups,
        }
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, volumes: &VoxelVolumes) {
        // One pass per level: level L+1 reads nothing until L is written.
        for (level, bind_group) in self.level_bind_groups.iter().enumerate() {
            let dst_dim = volumes.config.mip_dim(level as u32 + 1);
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Filter Radiance"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, bind_group, &[]);
            let groups = dispatch_size(dst_dim, 8);
            compute_pass.dispatch_workgroups(groups, groups, groups);
        }
    }
}

/// CPU mirror of one filter step: 2x2x2 box average with edge clamping,
/// `src` in x-major flat order.
pub fn box_filter_level(src: &[[f32; 4]], src_dim: u32) -> Vec<[f32; 4]> {
    let dst_dim = (src_dim / 2).max(1);
    let at = |x: u32, y: u32, z: u32| {
        let x = x.min(src_dim - 1);
        let y = y.min(src_dim - 1);
        let z = z.min(src_dim - 1);
        src[(x + y * src_dim + z * src_dim * src_dim) as usize]
    };

    let mut dst = Vec::with_capacity((dst_dim * dst_dim * dst_dim) as usize);
    for z in 0..dst_dim {
        for y in 0..dst_dim {
            for x in 0..dst_dim {
                let mut sum = [0.0f32; 4];
                for dz in 0..2 {
                    for dy in 0..2 {
                        for dx in 0..2 {
                            let s = at(x * 2 + dx, y * 2 + dy, z * 2 + dz);
                            for c in 0..4 {
                                sum[c] += s[c];
                            }
                        }
                    }
                }
                dst.push(sum.map(|v| v / 8.0));
            }
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_volume_stays_constant_through_the_pyramid() {
        let dim = 8u32;
        let base = vec![[0.25, 0.5, 0.75, 1.0]; (dim * dim * dim) as usize];

        let mut level = base;
        let mut level_dim = dim;
        while level_dim > 1 {
            level = box_filter_level(&level, level_dim);
            level_dim = (level_dim / 2).max(1);
            assert_eq!(level.len(), (level_dim * level_dim * level_dim) as usize);
            for v in &level {
                for c in 0..4 {
                    assert!((v[c] - [0.25, 0.5, 0.75, 1.0][c]).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn isolated_bright_voxel_spreads_and_dims() {
        let dim = 4u32;
        let mut base = vec![[0.0f32; 4]; (dim * dim * dim) as usize];
        base[0] = [8.0, 0.0, 0.0, 8.0];

        let level1 = box_filter_level(&base, dim);
        // The bright corner averages into exactly one coarse cell.
        assert_eq!(level1[0], [1.0, 0.0, 0.0, 1.0]);
        assert!(level1[1..].iter().all(|v| *v == [0.0; 4]));

        let level2 = box_filter_level(&level1, dim / 2);
        assert_eq!(level2.len(), 1);
        assert_eq!(level2[0], [0.125, 0.0, 0.0, 0.125]);
    }
}
