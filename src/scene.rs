//! Scene contents: loaded meshes plus the single mainlight.

use cgmath::Vector3;

use crate::data_structures::model::Mesh;

/// Directional light with a position, used both for the shadow frustum
/// origin and for distance falloff in shading.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
    /// Linear RGB radiant intensity.
    pub intensity: Vector3<f32>,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 30.0, 0.0),
            direction: Vector3::new(0.0, -1.0, 0.0),
            intensity: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

#[derive(Default)]
pub struct Scene {
    meshes: Vec<Mesh>,
    mainlight: Light,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn set_mainlight(&mut self, light: Light) {
        self.mainlight = light;
    }

    pub fn mainlight(&self) -> &Light {
        &self.mainlight
    }

    pub fn mainlight_mut(&mut self) -> &mut Light {
        &mut self.mainlight
    }
}
