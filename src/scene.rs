use glam::{Mat4, UVec4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Per-vertex attributes alongside the position array. The UV coordinate is
/// promoted to three components to match the GPU layout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VertexData {
    pub normal: Vec3,
    pub uv: Vec3,
}

/// Light source: emitted radiance plus a world transform placing it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub radiance: Vec4,
    pub transform: Mat4,
}

/// Surface description consumed by the shading kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub albedo: Vec3,
    pub roughness: f32,
    pub metallic: f32,
    pub ior: f32,
    pub anisotropy: f32,
    pub transmission: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::splat(0.8),
            roughness: 0.5,
            metallic: 0.0,
            ior: 1.45,
            anisotropy: 0.0,
            transmission: 0.0,
        }
    }
}

/// Immutable-after-load scene data.
///
/// Flat arrays mirrored one-to-one into GPU buffers. Each index quad holds
/// three offsets into `vertices` plus the triangle's face index;
/// `material_map` carries one material index per triangle and therefore has
/// the same length as `indices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub vertices: Vec<Vec3>,
    pub vertex_data: Vec<VertexData>,
    pub indices: Vec<UVec4>,
    pub lights: Vec<Light>,
    /// Number of lights per light type, four slots.
    pub light_count: UVec4,
    pub materials: Vec<Material>,
    pub material_map: Vec<u32>,
}

impl Default for Scene {
    /// Built-in fallback geometry: a single triangle in front of the origin,
    /// lit by the default light.
    fn default() -> Self {
        let normal = Vec3::new(0.0, 0.0, -1.0);
        Self {
            vertices: vec![
                Vec3::new(-1.0, -1.0, 5.0),
                Vec3::new(1.0, -1.0, 5.0),
                Vec3::new(0.0, 1.0, 5.0),
            ],
            vertex_data: vec![
                VertexData {
                    normal,
                    uv: Vec3::new(0.0, 0.0, 0.0),
                },
                VertexData {
                    normal,
                    uv: Vec3::new(1.0, 0.0, 0.0),
                },
                VertexData {
                    normal,
                    uv: Vec3::new(0.5, 1.0, 0.0),
                },
            ],
            indices: vec![UVec4::new(0, 1, 2, 0)],
            lights: vec![Self::default_light()],
            light_count: UVec4::new(1, 0, 0, 0),
            materials: vec![Material::default()],
            material_map: vec![0],
        }
    }
}

impl Scene {
    /// White point light placed above and in front of the default triangle.
    pub fn default_light() -> Light {
        Light {
            radiance: Vec4::new(20.0, 20.0, 20.0, 1.0),
            transform: Mat4::from_translation(Vec3::new(0.0, 4.0, 2.0)),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scene_shape() {
        let scene = Scene::default();
        assert_eq!(scene.vertices.len(), 3);
        assert_eq!(scene.indices, vec![UVec4::new(0, 1, 2, 0)]);
        assert_eq!(scene.lights.len(), 1);
        assert_eq!(scene.light_count, UVec4::new(1, 0, 0, 0));
        assert_eq!(scene.material_map.len(), scene.triangle_count());
    }

    #[test]
    fn default_scene_indices_are_in_bounds() {
        let scene = Scene::default();
        for quad in &scene.indices {
            for index in [quad.x, quad.y, quad.z] {
                assert!((index as usize) < scene.vertices.len());
            }
        }
    }

    #[test]
    fn vertex_data_matches_vertices() {
        let scene = Scene::default();
        assert_eq!(scene.vertex_data.len(), scene.vertices.len());
        for data in &scene.vertex_data {
            assert!((data.normal.length() - 1.0).abs() < 1e-5);
        }
    }
}
