//! Texture cache population during mesh load.
//!
//! Textures are loaded lazily on first reference and deduplicated by
//! filename, so repeated references across materials share one GPU handle.
//! A failed diffuse load is a warning and the default texture substitutes; a
//! failed or unsupported bump load disables normal mapping for that material.

use std::collections::HashMap;
use std::path::Path;

use crate::data_structures::model::MaterialParams;
use crate::data_structures::texture::{Texture, bump_channels_supported};

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    let path = Path::new("./").join("assets").join(file_name);
    Ok(std::fs::read_to_string(path)?)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = Path::new("./").join("assets").join(file_name);
    Ok(std::fs::read(path)?)
}

/// Material files exported on Windows reference textures with backslash
/// separators.
pub fn normalize_separators(name: &str) -> String {
    name.replace('\\', "/")
}

/// Cache key of the built-in fallback diffuse texture.
pub const DEFAULT_TEXTURE: &str = "default_texture";

/// Convert parsed OBJ materials into [`MaterialParams`], loading every
/// referenced texture into `textures` on first sight. Always appends the
/// synthetic default material last.
pub async fn load_material_textures(
    obj_materials: Vec<tobj::Material>,
    base_dir: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    textures: &mut HashMap<String, Texture>,
) -> Vec<MaterialParams> {
    let mut params = Vec::with_capacity(obj_materials.len() + 1);

    for m in obj_materials {
        if let Some(name) = &m.diffuse_texture {
            if !textures.contains_key(name) {
                let path = format!("{}{}", base_dir, normalize_separators(name));
                match load_diffuse(&path, device, queue).await {
                    Ok(texture) => {
                        textures.insert(name.clone(), texture);
                        log::info!("loaded diffuse {}", name);
                    }
                    Err(e) => {
                        log::warn!("diffuse map {} failed to load, using default: {e}", path);
                    }
                }
            }
        }

        if let Some(name) = &m.normal_texture {
            if !textures.contains_key(name) {
                let path = format!("{}{}", base_dir, normalize_separators(name));
                match load_bump(&path, device, queue).await {
                    Ok(texture) => {
                        textures.insert(name.clone(), texture);
                        log::info!("loaded normal map {}", name);
                    }
                    Err(e) => {
                        log::warn!("bump map {} skipped, normal mapping disabled: {e}", path);
                    }
                }
            }
        }

        params.push(MaterialParams {
            name: m.name,
            ambient: m.ambient.unwrap_or([1.0; 3]),
            diffuse: m.diffuse.unwrap_or([0.8; 3]),
            specular: m.specular.unwrap_or([0.0; 3]),
            shininess: m.shininess.unwrap_or(1.0),
            diffuse_texture: m.diffuse_texture,
            bump_texture: m.normal_texture,
        });
    }

    // The synthetic default material and its generated fallback texture are
    // always present, cached under a reserved key.
    textures.insert(
        DEFAULT_TEXTURE.to_string(),
        Texture::create_default_diffuse(device, queue),
    );
    params.push(MaterialParams::default_material());
    params
}

async fn load_diffuse(
    path: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Texture> {
    let data = load_binary(path).await?;
    Texture::from_bytes(device, queue, &data, path, false)
}

async fn load_bump(
    path: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Texture> {
    let data = load_binary(path).await?;
    let img = image::load_from_memory(&data)?;
    anyhow::ensure!(
        bump_channels_supported(&img),
        "{} channels, convert it to a normal map",
        img.color().channel_count()
    );
    Texture::from_image(device, queue, &img, Some(path), true)
}
