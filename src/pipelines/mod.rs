//! The five GPU passes and their shared bind group layouts.
//!
//! - `voxelize` rasterizes the scene into the voxel grid (plus the packed
//!   format's normalization dispatch)
//! - `shadow` renders depth from the mainlight
//! - `inject` seeds the radiance volume with shadow-tested direct lighting
//! - `mipmap` filters the radiance volume into its mip pyramid
//! - `phong` is the final forward pass with cone-traced indirect lighting

pub mod inject;
pub mod mipmap;
pub mod phong;
pub mod shadow;
pub mod voxelize;

use crate::data_structures::model::{Material, MaterialParams, MaterialUniform};
use crate::data_structures::texture::Texture;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

/// Number of workgroups covering `total` invocations at `local` per group.
pub fn dispatch_size(total: u32, local: u32) -> u32 {
    total.div_ceil(local)
}

/// Bind group layouts shared between mesh loading and the passes. Created
/// once and threaded through instead of re-derived at each use site.
#[derive(Debug)]
pub struct PassLayouts {
    /// Diffuse/bump textures and material scalars, per material.
    pub material: wgpu::BindGroupLayout,
    /// Model transform, per mesh. Vertex-stage visible.
    pub model: wgpu::BindGroupLayout,
    /// Model transform plus vertex/index storage for vertex pulling during
    /// voxelization, per drawable.
    pub voxel_geometry: wgpu::BindGroupLayout,
}

impl PassLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            material: material_layout(device),
            model: model_layout(device),
            voxel_geometry: voxel_geometry_layout(device),
        }
    }
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            texture_entry(0),
            sampler_entry(1),
            texture_entry(2),
            sampler_entry(3),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

pub fn model_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
        label: Some("model_bind_group_layout"),
    })
}

pub fn voxel_geometry_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            storage_entry(1),
            storage_entry(2),
        ],
        label: Some("voxel_geometry_bind_group_layout"),
    })
}

/// Build a material's bind group, resolving its texture names against the
/// mesh's cache and falling back to the built-in textures.
///
/// The cache always contains the fallback diffuse under
/// [`crate::resources::texture::DEFAULT_TEXTURE`].
pub fn mk_material(
    device: &wgpu::Device,
    params: MaterialParams,
    textures: &HashMap<String, Texture>,
    default_normal: &Texture,
    default_sampler: &wgpu::Sampler,
    layout: &wgpu::BindGroupLayout,
) -> Material {
    let default_diffuse = &textures[crate::resources::texture::DEFAULT_TEXTURE];
    let diffuse = params
        .diffuse_texture
        .as_ref()
        .and_then(|name| textures.get(name))
        .unwrap_or(default_diffuse);
    let bump = params
        .bump_texture
        .as_ref()
        .and_then(|name| textures.get(name));
    // Normal mapping only runs when the bump map actually loaded.
    let has_normal_map = bump.is_some();
    let bump = bump.unwrap_or(default_normal);

    let uniform = MaterialUniform::new(&params, has_normal_map);
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Material Buffer", params.name)),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&diffuse.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(
                    diffuse.sampler.as_ref().unwrap_or(default_sampler),
                ),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&bump.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(
                    bump.sampler.as_ref().unwrap_or(default_sampler),
                ),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: buffer.as_entire_binding(),
            },
        ],
        label: Some(&format!("{:?} material bind group", params.name)),
    });

    Material {
        params,
        has_normal_map,
        bind_group,
    }
}

#[cfg(test)]
mod tests {
    use super::dispatch_size;

    #[test]
    fn dispatch_size_rounds_up_partial_groups() {
        assert_eq!(dispatch_size(128, 4), 32);
        assert_eq!(dispatch_size(129, 4), 33);
        assert_eq!(dispatch_size(4096, 16), 256);
        assert_eq!(dispatch_size(1, 8), 1);
    }
}
