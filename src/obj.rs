use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glam::{UVec4, Vec3};
use log::warn;
use thiserror::Error;

use crate::scene::{Material, Scene, VertexData};

/// Failures surfaced by the OBJ/MTL loader. Callers log these and fall back
/// to the built-in default scene rather than aborting.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("vertex index {0} out of range")]
    Index(i32),
    #[error("OBJ file does not define any vertices")]
    NoVertices,
}

fn parse_error(line: usize, message: impl Into<String>) -> MeshError {
    MeshError::Parse {
        line: line + 1,
        message: message.into(),
    }
}

/// Loads a scene from an OBJ file, resolving `mtllib` references against
/// `material_root` (or the mesh's own directory when not given).
pub fn load_scene(path: &Path, material_root: Option<&Path>) -> Result<Scene, MeshError> {
    let obj = fs::read_to_string(path).map_err(|source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let root = material_root
        .map(Path::to_path_buf)
        .or_else(|| path.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    let mut mtl = String::new();
    for line in obj.lines() {
        let Some(name) = line.trim().strip_prefix("mtllib ") else {
            continue;
        };
        let lib_path = root.join(name.trim());
        match fs::read_to_string(&lib_path) {
            Ok(contents) => {
                mtl.push_str(&contents);
                mtl.push('\n');
            }
            Err(err) => warn!("skipping material library {}: {err}", lib_path.display()),
        }
    }

    parse_obj(&obj, (!mtl.is_empty()).then_some(mtl.as_str()))
}

/// Parses OBJ (and optional MTL) text into a [`Scene`].
///
/// Faces are fan-triangulated, `v/vt/vn` reference forms and negative
/// indices are supported, and vertices are deduplicated on the full index
/// triple. Triangles emitted while a `usemtl` is active map to that
/// material; everything else maps to material zero.
pub fn parse_obj(obj: &str, mtl: Option<&str>) -> Result<Scene, MeshError> {
    let (mut materials, material_names) = mtl.map(parse_mtl).unwrap_or_default();

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut faces: Vec<([FaceIndex; 3], u32)> = Vec::new();
    let mut current_material = 0u32;

    for (line_no, line) in obj.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(parse_vec3(line_no, parts)?),
            "vn" => normals.push(parse_vec3(line_no, parts)?),
            "vt" => {
                // UVs are promoted to three components; OBJ allows a third
                // coordinate which we keep when present.
                let mut numbers = parts.map(|p| p.parse::<f32>());
                let u = numbers
                    .next()
                    .transpose()
                    .map_err(|err| parse_error(line_no, err.to_string()))?
                    .ok_or_else(|| parse_error(line_no, "missing texture coordinate"))?;
                let v = numbers
                    .next()
                    .transpose()
                    .map_err(|err| parse_error(line_no, err.to_string()))?
                    .unwrap_or(0.0);
                let w = numbers
                    .next()
                    .transpose()
                    .map_err(|err| parse_error(line_no, err.to_string()))?
                    .unwrap_or(0.0);
                uvs.push(Vec3::new(u, v, w));
            }
            "f" => {
                let polygon = parse_face(line_no, parts)?;
                for i in 1..(polygon.len() - 1) {
                    faces.push(([polygon[0], polygon[i], polygon[i + 1]], current_material));
                }
            }
            "usemtl" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                current_material = match material_names.get(name.as_str()) {
                    Some(index) => *index,
                    None => {
                        warn!("unknown material {name:?}, using material 0");
                        0
                    }
                };
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(MeshError::NoVertices);
    }
    if materials.is_empty() {
        materials.push(Material::default());
    }

    let mut scene = build_scene(&positions, &normals, &uvs, &faces)?;
    scene.materials = materials;
    if scene.vertex_data.iter().any(|d| d.normal == Vec3::ZERO) {
        compute_normals(&mut scene);
    }
    Ok(scene)
}

fn parse_vec3<'a>(
    line_no: usize,
    mut parts: impl Iterator<Item = &'a str>,
) -> Result<Vec3, MeshError> {
    let mut component = || -> Result<f32, MeshError> {
        parts
            .next()
            .ok_or_else(|| parse_error(line_no, "missing vector component"))?
            .parse::<f32>()
            .map_err(|err| parse_error(line_no, err.to_string()))
    };
    let x = component()?;
    let y = component()?;
    let z = component()?;
    Ok(Vec3::new(x, y, z))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

fn parse_face<'a>(
    line_no: usize,
    parts: impl Iterator<Item = &'a str>,
) -> Result<Vec<FaceIndex>, MeshError> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| parse_error(line_no, "missing vertex index"))?
            .parse::<i32>()
            .map_err(|err| parse_error(line_no, err.to_string()))?;
        let vt = segments
            .next()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        let vn = segments
            .next()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(parse_error(line_no, "faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn build_scene(
    positions: &[Vec3],
    normals: &[Vec3],
    uvs: &[Vec3],
    faces: &[([FaceIndex; 3], u32)],
) -> Result<Scene, MeshError> {
    let mut lookup: HashMap<FaceIndex, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut vertex_data = Vec::new();
    let mut indices = Vec::new();
    let mut material_map = Vec::new();

    for (face_ordinal, (face, material)) in faces.iter().enumerate() {
        let mut quad = [0u32; 3];
        for (slot, idx) in face.iter().enumerate() {
            let position = fix_index(idx.v, positions.len()).ok_or(MeshError::Index(idx.v))?;
            let next_index = vertices.len() as u32;
            let entry = lookup.entry(*idx).or_insert_with(|| {
                vertices.push(positions[position]);
                vertex_data.push(VertexData {
                    normal: fix_index(idx.vn, normals.len())
                        .map(|i| normals[i])
                        .unwrap_or(Vec3::ZERO),
                    uv: fix_index(idx.vt, uvs.len())
                        .map(|i| uvs[i])
                        .unwrap_or(Vec3::ZERO),
                });
                next_index
            });
            quad[slot] = *entry;
        }
        indices.push(UVec4::new(quad[0], quad[1], quad[2], face_ordinal as u32));
        material_map.push(*material);
    }

    Ok(Scene {
        vertices,
        vertex_data,
        indices,
        lights: vec![Scene::default_light()],
        light_count: UVec4::new(1, 0, 0, 0),
        materials: Vec::new(),
        material_map,
    })
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = (-index) as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

fn compute_normals(scene: &mut Scene) {
    let mut accum = vec![Vec3::ZERO; scene.vertices.len()];

    for quad in &scene.indices {
        let [i0, i1, i2] = [quad.x as usize, quad.y as usize, quad.z as usize];
        let normal = (scene.vertices[i1] - scene.vertices[i0])
            .cross(scene.vertices[i2] - scene.vertices[i0]);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (data, normal) in scene.vertex_data.iter_mut().zip(accum) {
        if data.normal == Vec3::ZERO {
            data.normal = normal.normalize_or_zero();
        }
    }
}

/// Parses an MTL material library into the material array plus a
/// name-to-index lookup.
fn parse_mtl(src: &str) -> (Vec<Material>, HashMap<String, u32>) {
    let mut materials = Vec::new();
    let mut names = HashMap::new();

    for line in src.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        if tag == "newmtl" {
            let name = parts.collect::<Vec<_>>().join(" ");
            names.insert(name, materials.len() as u32);
            materials.push(Material::default());
            continue;
        }
        let Some(material) = materials.last_mut() else {
            continue;
        };
        let mut floats = parts.filter_map(|p| p.parse::<f32>().ok());
        match tag {
            "Kd" => {
                if let (Some(r), Some(g), Some(b)) = (floats.next(), floats.next(), floats.next()) {
                    material.albedo = Vec3::new(r, g, b);
                }
            }
            // Specular exponent, mapped onto the roughness scale unless an
            // explicit Pr follows.
            "Ns" => {
                if let Some(ns) = floats.next() {
                    material.roughness = (1.0 - ns / 1000.0).clamp(0.0, 1.0);
                }
            }
            "Pr" => {
                if let Some(value) = floats.next() {
                    material.roughness = value.clamp(0.0, 1.0);
                }
            }
            "Pm" => {
                if let Some(value) = floats.next() {
                    material.metallic = value.clamp(0.0, 1.0);
                }
            }
            "Ni" => {
                if let Some(value) = floats.next() {
                    material.ior = value;
                }
            }
            "aniso" => {
                if let Some(value) = floats.next() {
                    material.anisotropy = value;
                }
            }
            "Tr" => {
                if let Some(value) = floats.next() {
                    material.transmission = value.clamp(0.0, 1.0);
                }
            }
            "d" => {
                if let Some(value) = floats.next() {
                    material.transmission = (1.0 - value).clamp(0.0, 1.0);
                }
            }
            _ => {}
        }
    }

    (materials, names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;
    use std::io::Write;

    const TRIANGLE: &str = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn parses_simple_triangle() {
        let scene = parse_obj(TRIANGLE, None).unwrap();
        assert_eq!(scene.vertices.len(), 3);
        assert_eq!(scene.indices, vec![UVec4::new(0, 1, 2, 0)]);
        assert_eq!(scene.material_map, vec![0]);
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.light_count, UVec4::new(1, 0, 0, 0));
    }

    #[test]
    fn material_map_length_equals_triangle_count() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nusemtl red\nf 1 2 3\nusemtl green\nf 1 3 4\n";
        let mtl = "newmtl red\nKd 1 0 0\nnewmtl green\nKd 0 1 0\n";
        let scene = parse_obj(obj, Some(mtl)).unwrap();
        assert_eq!(scene.triangle_count(), 2);
        assert_eq!(scene.material_map, vec![0, 1]);
        assert_eq!(scene.materials.len(), 2);
        assert_eq!(scene.materials[1].albedo, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let scene = parse_obj(obj, None).unwrap();
        assert_eq!(scene.triangle_count(), 2);
        // The face ordinal rides in the quad's fourth component.
        assert_eq!(scene.indices[0].w, 0);
        assert_eq!(scene.indices[1].w, 1);
    }

    #[test]
    fn negative_indices_resolve_from_the_end() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let scene = parse_obj(obj, None).unwrap();
        assert_eq!(scene.indices[0].xyz(), glam::UVec3::new(0, 1, 2));
    }

    #[test]
    fn missing_normals_are_computed() {
        let scene = parse_obj(TRIANGLE, None).unwrap();
        for data in &scene.vertex_data {
            assert!((data.normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn uvs_are_promoted_to_three_components() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.5 0.25\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n";
        let scene = parse_obj(obj, None).unwrap();
        assert_eq!(scene.vertex_data[0].uv, Vec3::new(0.5, 0.25, 0.0));
    }

    #[test]
    fn empty_mesh_is_an_error() {
        assert!(matches!(parse_obj("# nothing\n", None), Err(MeshError::NoVertices)));
    }

    #[test]
    fn unknown_material_falls_back_to_zero() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl missing\nf 1 2 3\n";
        let scene = parse_obj(obj, None).unwrap();
        assert_eq!(scene.material_map, vec![0]);
    }

    #[test]
    fn mtl_scalar_channels_are_parsed() {
        let mtl = "newmtl glass\nKd 0.9 0.9 1\nPr 0.1\nPm 0.2\nNi 1.5\naniso 0.3\nTr 0.8\n";
        let (materials, names) = parse_mtl(mtl);
        assert_eq!(names["glass"], 0);
        let glass = materials[0];
        assert!((glass.roughness - 0.1).abs() < 1e-6);
        assert!((glass.metallic - 0.2).abs() < 1e-6);
        assert!((glass.ior - 1.5).abs() < 1e-6);
        assert!((glass.anisotropy - 0.3).abs() < 1e-6);
        assert!((glass.transmission - 0.8).abs() < 1e-6);
    }

    #[test]
    fn load_scene_resolves_material_libraries() {
        let dir = tempfile::tempdir().unwrap();
        let mtl_path = dir.path().join("scene.mtl");
        let obj_path = dir.path().join("scene.obj");
        let mut mtl = std::fs::File::create(&mtl_path).unwrap();
        writeln!(mtl, "newmtl red\nKd 1 0 0").unwrap();
        let mut obj = std::fs::File::create(&obj_path).unwrap();
        writeln!(obj, "mtllib scene.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl red\nf 1 2 3").unwrap();

        let scene = load_scene(&obj_path, None).unwrap();
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].albedo, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_scene(Path::new("/definitely/not/here.obj"), None).unwrap_err();
        assert!(matches!(err, MeshError::Io { .. }));
    }
}
