//! voxcone
//!
//! A real-time global-illumination renderer built on wgpu. The scene is
//! voxelized into a 3D grid every frame, direct lighting is injected into a
//! radiance volume using a shadow map, the volume is filtered into a mip
//! pyramid, and the final forward pass cone-traces through that pyramid to
//! approximate indirect lighting.
//!
//! High-level modules
//! - `camera`: camera, projection and uniform for the final pass
//! - `capabilities`: device feature descriptor, computed once at startup
//! - `context`: central GPU and window context that owns device/queue
//! - `data_structures`: meshes, materials, textures and voxel volumes
//! - `pipelines`: the five GPU passes (voxelize, shadow, inject, mip, phong)
//! - `renderer`: per-frame pass orchestration
//! - `resources`: OBJ/texture loading and CPU mesh preparation
//! - `scene`: mesh + mainlight container
//! - `settings`: the full configuration surface
//!

pub mod camera;
pub mod capabilities;
pub mod context;
pub mod data_structures;
pub mod pipelines;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod settings;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
