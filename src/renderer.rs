//! Frame orchestration.
//!
//! Owns the voxel grid resources, the shadow map and the five passes, and
//! records them in their required order every frame:
//!
//! 1. clear accumulation, voxelize (with normalization on the packed path)
//! 2. shadow depth
//! 3. clear radiance, inject direct lighting
//! 4. filter the radiance pyramid
//! 5. final shading
//!
//! Voxelization and the shadow pass are mutually independent but both must
//! complete before injection; encoding them sequentially into one command
//! buffer gives every later pass the ordering it needs.

use anyhow::{Context as _, Result};

use crate::capabilities::Capabilities;
use crate::data_structures::texture::Texture;
use crate::data_structures::volume::VoxelVolumes;
use crate::pipelines::{
    PassLayouts, inject::InjectPass, mipmap::MipmapPass, phong::PhongPass, shadow::ShadowPass,
    voxelize::VoxelizePass,
};
use crate::scene::Scene;
use crate::settings::{RenderSettings, VoxelConfig};

pub struct Renderer {
    pub settings: RenderSettings,
    pub layouts: PassLayouts,
    volumes: VoxelVolumes,
    shadow_map: Texture,
    voxelize: VoxelizePass,
    shadow: ShadowPass,
    inject: InjectPass,
    mipmap: MipmapPass,
    phong: PhongPass,
}

impl Renderer {
    pub fn new(
        device: &wgpu::Device,
        capabilities: &Capabilities,
        config: VoxelConfig,
        camera_buffer: &wgpu::Buffer,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        log::info!(
            "renderer init: voxel dim {}, {} radiance levels, shadow map {}px, \
             float atomics {}, conservative raster {}",
            config.dim,
            config.levels,
            config.shadow_dim,
            capabilities.atomic_float32,
            capabilities.conservative_rasterization,
        );

        let layouts = PassLayouts::new(device);
        let volumes = VoxelVolumes::new(device, config);
        let shadow_map = Texture::create_shadow_map(device, config.shadow_dim, "shadow map");
        let shadow_sampler = shadow_map
            .sampler
            .as_ref()
            .context("shadow map created without its comparison sampler")?;

        let voxelize = VoxelizePass::new(device, capabilities, &layouts, &volumes);
        let shadow = ShadowPass::new(device, &layouts);
        let inject = InjectPass::new(device, &volumes, &shadow_map.view);
        let mipmap = MipmapPass::new(device, &volumes);
        let phong = PhongPass::new(
            device,
            capabilities,
            &layouts,
            &volumes,
            &shadow_map.view,
            shadow_sampler,
            camera_buffer,
            surface_format,
        );

        Ok(Self {
            settings: RenderSettings::default(),
            layouts,
            volumes,
            shadow_map,
            voxelize,
            shadow,
            inject,
            mipmap,
            phong,
        })
    }

    pub fn config(&self) -> &VoxelConfig {
        &self.volumes.config
    }

    /// Record and submit one full frame.
    pub fn render_frame(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        scene: &Scene,
    ) {
        let light = scene.mainlight();
        self.voxelize.prepare(queue, &self.volumes, &self.settings);
        self.shadow.prepare(queue, light);
        self.inject.prepare(queue, &self.volumes.config, light);
        self.phong
            .prepare(queue, &self.volumes.config, &self.settings, light);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        self.volumes.clear_accumulation(&mut encoder);
        self.voxelize
            .record(&mut encoder, &self.volumes, scene, &self.settings);
        self.shadow.record(&mut encoder, &self.shadow_map.view, scene);

        self.volumes.clear_radiance(&mut encoder);
        self.inject.record(&mut encoder, &self.volumes.config);
        self.mipmap.record(&mut encoder, &self.volumes);

        self.phong
            .record(&mut encoder, color_view, depth_view, scene, &self.settings);

        queue.submit(std::iter::once(encoder.finish()));
    }
}
