//! Render settings and voxel grid configuration.
//!
//! Everything here is plain data read by the renderer each frame. The debug
//! toggles are not mutually exclusive; they select shading terms and debug
//! views inside the final-pass shader without changing pass structure.

/// Static voxel grid configuration, fixed at renderer creation.
#[derive(Debug, Clone, Copy)]
pub struct VoxelConfig {
    /// Base edge length of the voxel grid, in voxels.
    pub dim: u32,
    /// Number of additional radiance mip levels built per frame.
    pub levels: u32,
    /// Shadow map edge length in texels. Also the injection dispatch size.
    pub shadow_dim: u32,
    /// World-space half extent covered by the grid along each axis.
    pub world_extent: f32,
}

impl Default for VoxelConfig {
    fn default() -> Self {
        Self {
            dim: 128,
            levels: 6,
            shadow_dim: 4096,
            world_extent: 20.0,
        }
    }
}

impl VoxelConfig {
    /// Dimension of radiance mip level `level` (floor-halved per level).
    pub fn mip_dim(&self, level: u32) -> u32 {
        (self.dim >> level).max(1)
    }
}

/// Per-frame tunables for shading, cone tracing and debugging.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// -1 picks the dominant axis per triangle; 0/1/2 force X/Y/Z.
    pub axis_override: i32,
    /// Enable conservative rasterization during voxelization when supported.
    pub conservative_rasterization: bool,

    pub enable_shadows: bool,
    pub enable_normal_map: bool,
    pub enable_indirect: bool,
    pub enable_diffuse: bool,
    pub enable_specular: bool,
    pub ambient_scale: f32,

    /// Number of steps taken along each cone.
    pub vct_steps: i32,
    /// Offset along the surface normal before tracing, avoiding self-occlusion.
    pub vct_bias: f32,
    /// Tangent of the cone half-angle; footprint growth per unit height.
    pub vct_cone_angle: f32,
    /// Starting height of each cone in voxel units.
    pub vct_cone_initial_height: f32,
    /// Added to the computed LOD when sampling the radiance pyramid.
    pub vct_lod_offset: f32,

    /// Mip level shown by the raw-voxel debug view.
    pub mip_level: i32,
    pub wireframe: bool,
    pub draw_voxels: bool,
    pub draw_normals: bool,
    pub draw_dominant_axis: bool,
    pub draw_radiance: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            axis_override: -1,
            conservative_rasterization: true,
            enable_shadows: true,
            enable_normal_map: true,
            enable_indirect: true,
            enable_diffuse: true,
            enable_specular: true,
            ambient_scale: 0.2,
            vct_steps: 16,
            vct_bias: 2.5,
            vct_cone_angle: 0.577,
            vct_cone_initial_height: 1.0,
            vct_lod_offset: 0.0,
            mip_level: 0,
            wireframe: false,
            draw_voxels: false,
            draw_normals: false,
            draw_dominant_axis: false,
            draw_radiance: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_dims_floor_halve_down_to_one() {
        let config = VoxelConfig {
            dim: 128,
            levels: 6,
            ..Default::default()
        };
        let dims: Vec<u32> = (0..=config.levels).map(|l| config.mip_dim(l)).collect();
        assert_eq!(dims, vec![128, 64, 32, 16, 8, 4, 2]);
        // Deep levels clamp instead of reaching zero.
        assert_eq!(config.mip_dim(9), 1);
    }
}
