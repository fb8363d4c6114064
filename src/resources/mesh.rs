//! CPU mesh preparation: vertex welding, tangent-space computation and
//! bounding data.
//!
//! OBJ files index position/normal/texcoord independently per face corner and
//! don't ship tangents, so before upload every face-vertex reference is
//! welded by its (position, normal, texcoord) index triple and tangents are
//! accumulated across adjacent faces. The output is one shared vertex buffer
//! plus one triangle index list per material; faces without a resolved
//! material land in the trailing default list.

use std::collections::HashMap;

use anyhow::{Result, ensure};
use cgmath::{InnerSpace, Vector2, Vector3};
use wgpu::util::DeviceExt;

use crate::data_structures::model::{
    Drawable, Mesh, MeshBounds, MeshVertex, ModelUniform, VertexKey,
};

/// The CPU result of mesh preparation, ready for a single upload.
#[derive(Debug)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    /// One triangle index list per material; the last list belongs to the
    /// synthetic default material.
    pub drawable_indices: Vec<Vec<u32>>,
    pub bounds: MeshBounds,
}

impl MeshData {
    /// Index of the default drawable, always last.
    pub fn default_slot(&self) -> usize {
        self.drawable_indices.len() - 1
    }
}

/// Weld vertices, accumulate tangent space and compute bounds for a set of
/// loaded OBJ models sharing one material table of `material_count` entries.
///
/// Faces must arrive triangulated; anything else is a fatal input-format
/// violation. `material_id`s outside the table resolve to the default slot.
pub fn prepare_mesh(models: &[tobj::Model], material_count: usize) -> Result<MeshData> {
    let default_slot = material_count;
    let mut drawable_indices: Vec<Vec<u32>> = vec![Vec::new(); material_count + 1];

    let mut vertex_map: HashMap<VertexKey, u32> = HashMap::new();
    let mut vertices: Vec<MeshVertex> = Vec::new();

    for m in models {
        let mesh = &m.mesh;
        ensure!(
            mesh.face_arities.is_empty() && mesh.indices.len() % 3 == 0,
            "mesh {:?} contains non-triangulated faces",
            m.name
        );

        let slot = match mesh.material_id {
            Some(id) if id < material_count => id,
            _ => default_slot,
        };
        let indices = &mut drawable_indices[slot];

        for face in 0..mesh.indices.len() / 3 {
            let mut tri = [0u32; 3];
            for v in 0..3 {
                let i = face * 3 + v;
                let key = VertexKey {
                    position: mesh.indices[i],
                    normal: mesh.normal_indices.get(i).map_or(-1, |&n| n as i32),
                    texcoord: mesh.texcoord_indices.get(i).map_or(-1, |&t| t as i32),
                };

                let slot = *vertex_map.entry(key).or_insert_with(|| {
                    let index = vertices.len() as u32;
                    let p = key.position as usize;
                    let mut vertex = MeshVertex {
                        position: [
                            mesh.positions[p * 3],
                            mesh.positions[p * 3 + 1],
                            mesh.positions[p * 3 + 2],
                        ],
                        normal: [0.0; 3],
                        texcoord: [0.0; 2],
                        tangent: [0.0; 3],
                        bitangent: [0.0; 3],
                    };
                    if key.normal >= 0 {
                        let n = key.normal as usize;
                        vertex.normal = [
                            mesh.normals[n * 3],
                            mesh.normals[n * 3 + 1],
                            mesh.normals[n * 3 + 2],
                        ];
                    }
                    if key.texcoord >= 0 {
                        let t = key.texcoord as usize;
                        // OBJ puts the V origin at the bottom; textures are
                        // uploaded top-down.
                        vertex.texcoord =
                            [mesh.texcoords[t * 2], 1.0 - mesh.texcoords[t * 2 + 1]];
                    }
                    vertices.push(vertex);
                    index
                });
                tri[v] = slot;
                indices.push(slot);
            }

            accumulate_tangents(&mut vertices, tri);
        }
    }

    let mut bounds = MeshBounds::empty();
    for v in &mut vertices {
        // One normalization after all adjacent faces contributed.
        v.tangent = normalize_or_zero(v.tangent.into()).into();
        v.bitangent = normalize_or_zero(v.bitangent.into()).into();
        bounds.include(v.position);
    }
    bounds.finish();

    Ok(MeshData {
        vertices,
        drawable_indices,
        bounds,
    })
}

/// Per-face tangent/bitangent from the edge vectors and texcoord deltas,
/// added un-normalized to all three corners.
///
/// A zero UV determinant leaves the tangent undefined (non-finite values
/// propagate into the accumulator and are zeroed at normalization time).
fn accumulate_tangents(vertices: &mut [MeshVertex], tri: [u32; 3]) {
    let [i0, i1, i2] = tri.map(|i| i as usize);
    let p0: Vector3<f32> = vertices[i0].position.into();
    let p1: Vector3<f32> = vertices[i1].position.into();
    let p2: Vector3<f32> = vertices[i2].position.into();
    let uv0: Vector2<f32> = vertices[i0].texcoord.into();
    let uv1: Vector2<f32> = vertices[i1].texcoord.into();
    let uv2: Vector2<f32> = vertices[i2].texcoord.into();

    let edge1 = p1 - p0;
    let edge2 = p2 - p0;
    let delta_uv1 = uv1 - uv0;
    let delta_uv2 = uv2 - uv0;

    let inv_determinant = 1.0 / (delta_uv1.x * delta_uv2.y - delta_uv2.x * delta_uv1.y);
    let tangent = (edge1 * delta_uv2.y - edge2 * delta_uv1.y) * inv_determinant;
    let bitangent = (edge2 * delta_uv1.x - edge1 * delta_uv2.x) * inv_determinant;

    for i in [i0, i1, i2] {
        vertices[i].tangent = (Vector3::from(vertices[i].tangent) + tangent).into();
        vertices[i].bitangent = (Vector3::from(vertices[i].bitangent) + bitangent).into();
    }
}

fn normalize_or_zero(v: Vector3<f32>) -> Vector3<f32> {
    let len2 = v.magnitude2();
    if len2.is_finite() && len2 > 0.0 {
        v / len2.sqrt()
    } else {
        Vector3::new(0.0, 0.0, 0.0)
    }
}

/// Upload prepared geometry once. Vertex and index buffers additionally carry
/// `STORAGE` usage because the voxelization vertex stage pulls triangles from
/// them; they are immutable afterwards.
pub fn upload_mesh(
    device: &wgpu::Device,
    name: &str,
    data: &MeshData,
    model: cgmath::Matrix4<f32>,
    model_layout: &wgpu::BindGroupLayout,
    voxel_geometry_layout: &wgpu::BindGroupLayout,
) -> (
    wgpu::Buffer,
    wgpu::Buffer,
    wgpu::BindGroup,
    Vec<(usize, wgpu::Buffer, u32, wgpu::BindGroup)>,
) {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", name)),
        contents: bytemuck::cast_slice(&data.vertices),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE,
    });

    let model_uniform = ModelUniform {
        model: model.into(),
    };
    let model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Model Buffer", name)),
        contents: bytemuck::cast_slice(&[model_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let model_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: model_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: model_buffer.as_entire_binding(),
        }],
        label: Some(&format!("{:?} model bind group", name)),
    });

    let mut drawables = Vec::new();
    for (material_id, indices) in data.drawable_indices.iter().enumerate() {
        if indices.is_empty() {
            continue;
        }
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer {}", name, material_id)),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::STORAGE,
        });
        let voxel_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: voxel_geometry_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: model_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: vertex_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: index_buffer.as_entire_binding(),
                },
            ],
            label: Some(&format!("{:?} voxel geometry bind group", name)),
        });
        drawables.push((
            material_id,
            index_buffer,
            indices.len() as u32,
            voxel_bind_group,
        ));
    }

    (vertex_buffer, model_buffer, model_bind_group, drawables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model(mesh: tobj::Mesh) -> tobj::Model {
        tobj::Model::new(mesh, "test".to_string())
    }

    /// Two triangles sharing an edge; all corners share position 1:1 with
    /// normals and texcoords (a flat quad in the XY plane with planar UVs).
    fn quad() -> tobj::Model {
        model(tobj::Mesh {
            positions: vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                1.0, 1.0, 0.0, //
                0.0, 1.0, 0.0,
            ],
            normals: vec![
                0.0, 0.0, 1.0, //
                0.0, 0.0, 1.0, //
                0.0, 0.0, 1.0, //
                0.0, 0.0, 1.0,
            ],
            texcoords: vec![
                0.0, 0.0, //
                1.0, 0.0, //
                1.0, 1.0, //
                0.0, 1.0,
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
            normal_indices: vec![0, 1, 2, 0, 2, 3],
            texcoord_indices: vec![0, 1, 2, 0, 2, 3],
            material_id: Some(0),
            ..Default::default()
        })
    }

    #[test]
    fn shared_index_triples_weld_to_one_slot() {
        let data = prepare_mesh(&[quad()], 1).unwrap();

        // 6 face-vertex references but only 4 distinct (pos, normal, uv) triples.
        assert_eq!(data.vertices.len(), 4);
        let indices = &data.drawable_indices[0];
        assert_eq!(indices.len(), 6);
        // Corner 0 and corner 2 appear in both triangles through the same slot.
        assert_eq!(indices[0], indices[3]);
        assert_eq!(indices[2], indices[4]);
        assert!(indices.iter().all(|&i| (i as usize) < data.vertices.len()));
    }

    #[test]
    fn distinct_attribute_triples_stay_separate() {
        // Same positions as the quad, but the second triangle re-references
        // position 0 with a different texcoord: no weld across the pair.
        let mut quad = quad();
        quad.mesh.texcoord_indices = vec![0, 1, 2, 3, 2, 3];
        let data = prepare_mesh(&[quad], 1).unwrap();
        assert_eq!(data.vertices.len(), 5);
    }

    #[test]
    fn tangents_are_unit_length_bisectors_on_shared_edges() {
        let data = prepare_mesh(&[quad()], 1).unwrap();

        // With consistent planar UVs both faces produce the same tangent
        // frame, so the shared-edge accumulation normalizes back to it.
        for v in &data.vertices {
            let t = Vector3::from(v.tangent);
            let b = Vector3::from(v.bitangent);
            assert_relative_eq!(t.magnitude(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(b.magnitude(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(t.x, 1.0, epsilon = 1e-5);
            assert_relative_eq!(b.y.abs(), 1.0, epsilon = 1e-5);
            // Tangent frame is orthogonal to the face normal.
            assert_relative_eq!(t.dot(Vector3::from(v.normal)), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn unresolved_material_faces_land_in_default_drawable() {
        let mut quad = quad();
        quad.mesh.material_id = None;
        let data = prepare_mesh(&[quad], 2).unwrap();

        assert_eq!(data.drawable_indices.len(), 3);
        assert!(data.drawable_indices[0].is_empty());
        assert!(data.drawable_indices[1].is_empty());
        assert_eq!(data.drawable_indices[data.default_slot()].len(), 6);
    }

    #[test]
    fn out_of_range_material_ids_fall_back_to_default() {
        let mut quad = quad();
        quad.mesh.material_id = Some(7);
        let data = prepare_mesh(&[quad], 1).unwrap();
        assert_eq!(data.drawable_indices[data.default_slot()].len(), 6);
    }

    #[test]
    fn non_triangulated_input_is_fatal() {
        let mut quad = quad();
        quad.mesh.indices.pop();
        assert!(prepare_mesh(&[quad], 1).is_err());
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let data = prepare_mesh(&[quad()], 1).unwrap();
        assert_eq!(data.bounds.min, [0.0, 0.0, 0.0]);
        assert_eq!(data.bounds.max, [1.0, 1.0, 0.0]);
        // Radius is half the largest extent.
        assert_relative_eq!(data.bounds.radius, 0.5);
    }

    #[test]
    fn missing_normals_and_texcoords_default_to_zero() {
        let m = model(tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            material_id: None,
            ..Default::default()
        });
        let data = prepare_mesh(&[m], 0).unwrap();
        assert_eq!(data.vertices.len(), 3);
        assert_eq!(data.vertices[0].normal, [0.0; 3]);
        assert_eq!(data.vertices[0].texcoord, [0.0; 2]);
        // Degenerate UVs leave the tangent undefined; the guard zeroes it.
        assert_eq!(data.vertices[0].tangent, [0.0; 3]);
    }
}
