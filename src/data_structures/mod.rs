//! Engine data structures: models, textures and voxel volumes.
//!
//! - `model` contains mesh, drawable and material definitions plus GPU buffers
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `volume` owns the voxel grid resources (color, normal, radiance pyramid)

pub mod model;
pub mod texture;
pub mod volume;
