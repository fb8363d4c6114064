//! Voxel grid resources: color and normal accumulation storage plus the
//! radiance mip pyramid.
//!
//! Color and normal live in storage buffers of four u32 words per voxel so
//! fragment shaders can accumulate concurrently with `atomicAdd`. On the
//! packed path the words hold fixed-point sums with the sample weight in the
//! fourth word; on the float-atomic path they hold f32 bit patterns. The
//! radiance volume is a real 3D texture so the cone-tracing pass can sample
//! it with trilinear mip filtering.

use crate::settings::VoxelConfig;

/// Fixed-point scale of the packed u32 accumulation path. Must match
/// `FIXED_SCALE` in `voxelize.wgsl`.
pub const FIXED_SCALE: f32 = 256.0;

/// Encode a unit-range value for fixed-point atomic accumulation.
pub fn fixed_encode(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * FIXED_SCALE) as u32
}

/// Decode a single accumulated fixed-point word.
pub fn fixed_decode(v: u32) -> f32 {
    v as f32 / FIXED_SCALE
}

/// CPU mirror of the shader's voxel resolve: divide accumulated color by
/// accumulated weight, turning a sum of samples into their weighted average.
pub fn resolve_voxel(sum: [u32; 4]) -> [f32; 4] {
    let weight = sum[3] as f32;
    if weight == 0.0 {
        return [0.0; 4];
    }
    [
        fixed_decode(sum[0]) / weight,
        fixed_decode(sum[1]) / weight,
        fixed_decode(sum[2]) / weight,
        1.0,
    ]
}

/// All GPU resources backing the voxel grid.
#[derive(Debug)]
pub struct VoxelVolumes {
    pub config: VoxelConfig,
    /// Accumulated albedo, 4 u32 words per voxel.
    pub color: wgpu::Buffer,
    /// Accumulated encoded normal, 4 u32 words per voxel.
    pub normal: wgpu::Buffer,
    pub radiance: wgpu::Texture,
    /// All mips; sampled by the cone-tracing pass.
    pub radiance_full_view: wgpu::TextureView,
    /// One view per mip; sources and targets of the filter pass, target of
    /// injection at level 0.
    pub radiance_mip_views: Vec<wgpu::TextureView>,
    pub radiance_sampler: wgpu::Sampler,
    /// Dummy color target; the voxelization pass writes no raster output but
    /// WebGPU render passes need at least one attachment.
    pub raster_target: wgpu::TextureView,
}

impl VoxelVolumes {
    pub const RADIANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, config: VoxelConfig) -> Self {
        let voxel_count = (config.dim as u64).pow(3);
        let accum_size = voxel_count * 4 * std::mem::size_of::<u32>() as u64;

        let mk_accum = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: accum_size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let color = mk_accum("voxel color accumulation");
        let normal = mk_accum("voxel normal accumulation");

        let mip_level_count = config.levels + 1;
        let radiance = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("voxel radiance pyramid"),
            size: wgpu::Extent3d {
                width: config.dim,
                height: config.dim,
                depth_or_array_layers: config.dim,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: Self::RADIANCE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let radiance_full_view = radiance.create_view(&wgpu::TextureViewDescriptor::default());
        let radiance_mip_views = (0..mip_level_count)
            .map(|level| {
                radiance.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("radiance mip view"),
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let radiance_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("radiance sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let raster_target = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("voxelization raster target"),
                size: wgpu::Extent3d {
                    width: config.dim,
                    height: config.dim,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            config,
            color,
            normal,
            radiance,
            radiance_full_view,
            radiance_mip_views,
            radiance_sampler,
            raster_target,
        }
    }

    /// Zero the color/normal accumulation before voxelization.
    pub fn clear_accumulation(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.color, 0, None);
        encoder.clear_buffer(&self.normal, 0, None);
    }

    /// Zero the whole radiance pyramid before injection. No radiance survives
    /// across frames.
    pub fn clear_radiance(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_texture(&self.radiance, &wgpu::ImageSubresourceRange::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fixed_point_roundtrip_is_stable() {
        for v in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_relative_eq!(fixed_decode(fixed_encode(v)), v, epsilon = 1.0 / FIXED_SCALE);
        }
        // Out-of-range inputs clamp instead of wrapping.
        assert_eq!(fixed_encode(-1.0), 0);
        assert_eq!(fixed_encode(2.0), FIXED_SCALE as u32);
    }

    #[test]
    fn accumulated_contributions_average_not_overwrite() {
        // Two fragments covering the same cell: one dark red, one bright red.
        let a = [fixed_encode(0.2), 0, 0, 1];
        let b = [fixed_encode(0.8), 0, 0, 1];
        let sum = [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]];

        let resolved = resolve_voxel(sum);
        // The weighted average of both samples, not either single one.
        assert_relative_eq!(resolved[0], 0.5, epsilon = 2.0 / FIXED_SCALE);
        assert_relative_eq!(resolved[1], 0.0);
        assert_relative_eq!(resolved[3], 1.0);
    }

    #[test]
    fn empty_voxels_resolve_to_zero() {
        assert_eq!(resolve_voxel([0; 4]), [0.0; 4]);
    }
}
