//! Loading of meshes and textures from external files.
//!
//! [`load_mesh_obj`] is the once-at-load mesh preparation step: parse the OBJ
//! and its material file, weld vertices and compute tangents on the CPU,
//! load referenced textures into the cache, and upload everything as
//! immutable GPU buffers with one drawable per material.

pub mod mesh;
pub mod texture;

use std::collections::HashMap;
use std::io::{BufReader, Cursor};

use instant::Instant;

use crate::data_structures::model::{Drawable, Mesh};
use crate::data_structures::texture::{Texture, create_default_sampler};
use crate::pipelines::{PassLayouts, mk_material};
use crate::resources::texture::{load_material_textures, load_string};

pub async fn load_mesh_obj(
    file_name: &str,
    model: cgmath::Matrix4<f32>,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layouts: &PassLayouts,
) -> anyhow::Result<Mesh> {
    let start = Instant::now();
    let base_dir = &file_name[..file_name.rfind('/').map_or(0, |i| i + 1)];

    let obj_text = load_string(file_name).await?;
    let obj_cursor = Cursor::new(obj_text);
    let mut obj_reader = BufReader::new(obj_cursor);

    // Separate attribute indices are kept so welding sees the original
    // (position, normal, texcoord) triples.
    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        },
        |p| {
            let path = format!("{}{}", base_dir, p);
            async move {
                let mat_text = load_string(&path)
                    .await
                    .map_err(|_| tobj::LoadError::OpenFileFailed)?;
                tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text)))
            }
        },
    )
    .await?;

    // A mesh with no material file still renders, via the default drawable.
    let obj_materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("no material file for {}: {}", file_name, e);
        Vec::new()
    });

    let mut textures: HashMap<String, Texture> = HashMap::new();
    let material_params =
        load_material_textures(obj_materials, base_dir, device, queue, &mut textures).await;

    // The default material is the last entry appended above.
    let data = mesh::prepare_mesh(&models, material_params.len() - 1)?;

    let (vertex_buffer, model_buffer, model_bind_group, raw_drawables) = mesh::upload_mesh(
        device,
        file_name,
        &data,
        model,
        &layouts.model,
        &layouts.voxel_geometry,
    );

    let default_normal = Texture::create_default_normal_map(device, queue);
    let default_sampler = create_default_sampler(device);
    let materials = material_params
        .into_iter()
        .map(|params| {
            mk_material(
                device,
                params,
                &textures,
                &default_normal,
                &default_sampler,
                &layouts.material,
            )
        })
        .collect::<Vec<_>>();

    let drawables = raw_drawables
        .into_iter()
        .map(
            |(material_id, index_buffer, num_elements, voxel_bind_group)| Drawable {
                material_id,
                index_buffer,
                num_elements,
                voxel_bind_group,
            },
        )
        .collect::<Vec<_>>();

    log::info!(
        "loaded mesh {} in {:.3}s: {} vertices, {} materials, {} drawables, bounds {:?}..{:?}, radius {}",
        file_name,
        start.elapsed().as_secs_f32(),
        data.vertices.len(),
        materials.len(),
        drawables.len(),
        data.bounds.min,
        data.bounds.max,
        data.bounds.radius,
    );

    Ok(Mesh {
        name: file_name.to_string(),
        vertex_buffer,
        num_vertices: data.vertices.len() as u32,
        model_buffer,
        model_bind_group,
        drawables,
        materials,
        bounds: data.bounds,
        textures,
    })
}
