//! Device capability detection.
//!
//! All capability-gated code paths (atomic float accumulation, conservative
//! rasterization, wireframe polygon mode) read from a [`Capabilities`] value
//! computed once from the adapter and passed into the affected components,
//! instead of querying feature flags inline at each use site.

/// Which optional device features are available for this run.
///
/// Computed once in [`crate::context::Context::new`] and never mutated.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// `atomicAdd` on 32-bit floats in shaders. Selects the high-precision
    /// voxel accumulation path that needs no normalization pass.
    pub atomic_float32: bool,
    /// Conservative rasterization for the voxelization pass, reducing gaps
    /// between coarse voxels and thin geometry.
    pub conservative_rasterization: bool,
    /// Line polygon mode for the wireframe debug toggle.
    pub polygon_mode_line: bool,
}

impl Capabilities {
    /// Probe the adapter for the optional features we know how to use.
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        let features = adapter.features();
        Self {
            atomic_float32: features.contains(wgpu::Features::SHADER_FLOAT32_ATOMIC),
            conservative_rasterization: features
                .contains(wgpu::Features::CONSERVATIVE_RASTERIZATION),
            polygon_mode_line: features.contains(wgpu::Features::POLYGON_MODE_LINE),
        }
    }

    /// The feature set to request at device creation.
    ///
    /// `CLEAR_TEXTURE` is unconditional because the radiance volume is wiped
    /// every frame; the rest only when the adapter offers them.
    pub fn requested_features(&self) -> wgpu::Features {
        let mut features = wgpu::Features::CLEAR_TEXTURE;
        if self.atomic_float32 {
            features |= wgpu::Features::SHADER_FLOAT32_ATOMIC;
        }
        if self.conservative_rasterization {
            features |= wgpu::Features::CONSERVATIVE_RASTERIZATION;
        }
        if self.polygon_mode_line {
            features |= wgpu::Features::POLYGON_MODE_LINE;
        }
        features
    }
}
