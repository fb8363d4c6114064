//! Mesh, drawable and material definitions.
//!
//! A [`Mesh`] owns one shared vertex buffer plus one [`Drawable`] per
//! material. Drawables are what the passes iterate over: each carries its own
//! index buffer and references a material bind group. The last drawable is
//! always the synthetic default material, which collects every face without a
//! resolved material id.

use std::collections::HashMap;

use crate::data_structures::texture::Texture;

/// One vertex of the prepared, welded vertex buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl MeshVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3,
        4 => Float32x3,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Composite identity key for vertex welding.
///
/// Two face-vertex references with the same (position, normal, texcoord)
/// index triple collapse into one output vertex. A plain struct hashed
/// directly; `-1` marks an absent normal or texcoord index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexKey {
    pub position: u32,
    pub normal: i32,
    pub texcoord: i32,
}

/// Scalar material properties as parsed from the companion material file.
#[derive(Debug, Clone)]
pub struct MaterialParams {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub diffuse_texture: Option<String>,
    pub bump_texture: Option<String>,
}

impl MaterialParams {
    /// The synthetic material appended after every load; faces without a
    /// resolved material bind to it and it always uses the built-in fallback
    /// diffuse texture.
    pub fn default_material() -> Self {
        Self {
            name: "default".to_string(),
            ambient: [1.0; 3],
            diffuse: [0.8; 3],
            specular: [0.0; 3],
            shininess: 1.0,
            diffuse_texture: Some(crate::resources::texture::DEFAULT_TEXTURE.to_string()),
            bump_texture: None,
        }
    }
}

/// Material scalars as uploaded to the per-material uniform buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub ambient: [f32; 3],
    pub shininess: f32,
    pub diffuse: [f32; 3],
    // Uniform fields need 16 byte alignment, so the flag rides in the padding slot
    pub has_normal_map: u32,
    pub specular: [f32; 3],
    pub _padding: u32,
}

impl MaterialUniform {
    pub fn new(params: &MaterialParams, has_normal_map: bool) -> Self {
        Self {
            ambient: params.ambient,
            shininess: params.shininess,
            diffuse: params.diffuse,
            has_normal_map: has_normal_map as u32,
            specular: params.specular,
            _padding: 0,
        }
    }
}

/// Per-mesh model transform as uploaded to its uniform buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
}

/// A material ready for binding: parsed scalars plus the bind group holding
/// diffuse/bump views and the material uniform.
#[derive(Debug)]
pub struct Material {
    pub params: MaterialParams,
    pub has_normal_map: bool,
    pub bind_group: wgpu::BindGroup,
}

/// One triangle list per material.
///
/// Invariants: the index count is a multiple of 3 and every index is a valid
/// offset into the mesh's shared vertex buffer. `voxel_bind_group` exposes
/// the model transform plus vertex/index storage for the vertex-pulling
/// voxelization stage.
#[derive(Debug)]
pub struct Drawable {
    pub material_id: usize,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub voxel_bind_group: wgpu::BindGroup,
}

/// Axis-aligned bounds derived once after vertex welding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub radius: f32,
}

impl MeshBounds {
    pub fn empty() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
            radius: 0.0,
        }
    }

    pub fn include(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn finish(&mut self) {
        let extents: Vec<f32> = (0..3).map(|i| self.max[i] - self.min[i]).collect();
        self.radius = extents.iter().cloned().fold(f32::MIN, f32::max) / 2.0;
    }
}

/// A fully prepared mesh: immutable GPU geometry, per-material drawables,
/// the texture cache that keeps loaded textures alive, and bounding data.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub num_vertices: u32,
    pub model_buffer: wgpu::Buffer,
    pub model_bind_group: wgpu::BindGroup,
    pub drawables: Vec<Drawable>,
    pub materials: Vec<Material>,
    pub bounds: MeshBounds,
    /// filename -> texture; shared across materials referencing the same file.
    pub textures: HashMap<String, Texture>,
}
