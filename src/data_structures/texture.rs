//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU texture resources,
//! and helpers for creating the shadow depth texture, fallback textures and
//! textures loaded from image data.

use anyhow::*;
use image::{DynamicImage, GenericImageView};

/// A GPU texture with a view and optional sampler.
///
/// Wraps WGPU texture objects along with associated views and samplers.
/// Used for diffuse maps, bump maps, the shadow depth map and fallbacks.
#[derive(Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Depth format used for the shadow map and the final-pass depth buffer.
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during the final pass.
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// Create the shadow map: a depth-only render target sampled later with a
    /// comparison sampler.
    ///
    /// wgpu has no border-color addressing, so lookups outside the light
    /// frustum are clamped here and treated as fully lit in the shader.
    pub fn create_shadow_map(device: &wgpu::Device, dim: u32, label: &str) -> Self {
        let mut texture = Self::create_depth_texture(device, [dim, dim], label);
        texture.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow comparison sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        }));
        texture
    }

    /// Create the built-in fallback diffuse texture: a small grey/white
    /// checkerboard assigned to the default material and to any material
    /// whose diffuse map failed to load.
    pub fn create_default_diffuse(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        const DIM: u32 = 4;
        let data: Vec<u8> = (0..DIM * DIM)
            .flat_map(|i| {
                let (x, y) = (i % DIM, i / DIM);
                let v = if (x + y) % 2 == 0 { 255u8 } else { 180u8 };
                [v, v, v, 255]
            })
            .collect();
        Self::from_rgba8(
            device,
            queue,
            &data,
            (DIM, DIM),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            Some("default diffuse texture"),
        )
    }

    /// Create a default normal map (neutral blue, representing no deformation).
    ///
    /// Bound when a material has no usable bump map so the pipeline layout
    /// never changes; the shader additionally skips perturbation entirely.
    pub fn create_default_normal_map(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let data: Vec<u8> = [127, 127, 255, 255].repeat(4);
        Self::from_rgba8(
            device,
            queue,
            &data,
            (2, 2),
            wgpu::TextureFormat::Rgba8Unorm,
            Some("default normal map"),
        )
    }

    fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
        dimensions: (u32, u32),
        format: wgpu::TextureFormat,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Load a texture from raw byte data (image file contents).
    ///
    /// `is_normal_map` toggles between sRGB (false) and linear (true) color
    /// space.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        is_normal_map: bool,
    ) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Self::from_image(device, queue, &img, Some(label), is_normal_map)
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &DynamicImage,
        label: Option<&str>,
        is_normal_map: bool,
    ) -> Result<Self> {
        let dimensions = img.dimensions();
        let rgba = img.to_rgba8();
        let format = if is_normal_map {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        };
        Ok(Self::from_rgba8(
            device,
            queue,
            &rgba,
            dimensions,
            format,
            label,
        ))
    }
}

/// Whether a decoded image is usable as a bump/normal map.
///
/// Only 3- and 4-channel images carry a tangent-space normal; anything else
/// (greyscale height maps in particular) is rejected with a warning upstream.
pub fn bump_channels_supported(img: &DynamicImage) -> bool {
    matches!(img.color().channel_count(), 3 | 4)
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_channel_bump_maps_are_rejected() {
        let grey_alpha = DynamicImage::ImageLumaA8(image::GrayAlphaImage::new(4, 4));
        assert!(!bump_channels_supported(&grey_alpha));

        let luma = DynamicImage::ImageLuma8(image::GrayImage::new(4, 4));
        assert!(!bump_channels_supported(&luma));

        let rgb = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        assert!(bump_channels_supported(&rgb));

        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::new(4, 4));
        assert!(bump_channels_supported(&rgba));
    }
}
