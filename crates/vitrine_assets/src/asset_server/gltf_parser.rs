use glam::{Quat, Vec3};
use gltf::khr_lights_punctual::Kind;
use vitrine_core::{
    material::{MaterialData, MaterialSettings},
    mesh::{MeshData, Vertex},
    scene_graph::SpotLight,
    transform::Transform,
};

use crate::scene::{SceneData, SceneNode};

pub fn parse_gltf(path: &str) -> Result<SceneData, String> {
    // A. Load Document & Buffers
    let (document, buffers, _images) = gltf::import(path).map_err(|e| e.to_string())?;

    let mut scene = SceneData::default();

    // --- STEP 1: MATERIALS ---
    for mat in document.materials() {
        let pbr = mat.pbr_metallic_roughness();
        let index = mat.index().unwrap_or(scene.materials.len());

        scene.add_material(MaterialData {
            name: mat
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material_{}", index)),
            settings: MaterialSettings {
                base_color: pbr.base_color_factor(),
                roughness: pbr.roughness_factor(),
                metallic: pbr.metallic_factor(),
                emissive: mat.emissive_factor(),
            },
            double_sided: mat.double_sided(),
        });
    }

    // --- STEP 2: MESHES ---
    // All primitives of a glTF mesh are merged so mesh indices line up 1:1.
    for mesh in document.meshes() {
        let mut merged = MeshData::default();

        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .map(|iter| iter.collect())
                .ok_or("Mesh missing positions")?;

            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);

            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|read| read.into_f32().collect())
                .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

            // Non-indexed primitives get a trivial index list
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|read| read.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, position)| Vertex {
                    position: *position,
                    normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                    uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                })
                .collect();

            merged.append(&MeshData { vertices, indices });
        }

        scene.add_mesh(merged);
    }

    // --- STEP 3: NODES (The Hierarchy) ---
    for node in document.nodes() {
        let (t, r, s) = node.transform().decomposed();

        let transform = Transform {
            translation: t.into(),
            rotation: Quat::from_array(r),
            scale: s.into(),
        };

        // In glTF, materials live on primitives; the first one wins.
        let material_index = node
            .mesh()
            .and_then(|m| m.primitives().next())
            .and_then(|p| p.material().index());

        scene.nodes.push(SceneNode {
            name: node
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("node_{}", node.index())),
            transform,
            mesh_index: node.mesh().map(|m| m.index()),
            material_index,
            light: node.light().and_then(|light| spot_light(&light)),
            children: node.children().map(|c| c.index()).collect(),
        });
    }

    Ok(scene)
}

/// Only spot lights are imported. glTF lights shine down the node's local -Z.
fn spot_light(light: &gltf::khr_lights_punctual::Light) -> Option<SpotLight> {
    match light.kind() {
        Kind::Spot {
            outer_cone_angle, ..
        } => {
            let defaults = SpotLight::default();
            let range = light.range().unwrap_or(defaults.range);
            Some(SpotLight {
                color: light.color(),
                intensity: light.intensity(),
                range,
                angle: outer_cone_angle,
                target: Vec3::NEG_Z * range,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// One triangle under a `col_` child of a root that carries a spot light.
    const LAMP_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "extensionsUsed": ["KHR_lights_punctual"],
        "extensions": {
            "KHR_lights_punctual": {
                "lights": [{
                    "type": "spot",
                    "color": [1.0, 0.5, 0.25],
                    "intensity": 3.0,
                    "range": 4.0,
                    "spot": { "innerConeAngle": 0.2, "outerConeAngle": 0.5 }
                }]
            }
        },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            {
                "name": "lamp",
                "children": [1],
                "extensions": { "KHR_lights_punctual": { "light": 0 } }
            },
            { "name": "col_box", "mesh": 0, "translation": [0.0, 1.0, 0.0] }
        ],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }],
        "materials": [{
            "name": "brass",
            "pbrMetallicRoughness": { "baseColorFactor": [0.8, 0.6, 0.2, 1.0] }
        }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "buffers": [{
            "byteLength": 36,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
        }]
    }"#;

    #[test]
    fn reads_hierarchy_meshes_and_spot_lights() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lamp.gltf");
        std::fs::write(&path, LAMP_GLTF).unwrap();

        let scene = parse_gltf(path.to_str().unwrap()).unwrap();

        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.nodes[0].name, "lamp");
        assert_eq!(scene.nodes[0].children, vec![1]);

        let collider = &scene.nodes[1];
        assert_eq!(collider.name, "col_box");
        assert_eq!(collider.mesh_index, Some(0));
        assert_eq!(collider.material_index, Some(0));
        assert!(collider.transform.translation.abs_diff_eq(Vec3::Y, 1e-6));

        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(scene.materials[0].name, "brass");

        let light = scene.nodes[0].light.as_ref().unwrap();
        assert!((light.angle - 0.5).abs() < 1e-6);
        assert!((light.range - 4.0).abs() < 1e-6);
        assert!(light.target.abs_diff_eq(Vec3::new(0.0, 0.0, -4.0), 1e-6));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.gltf");

        assert!(parse_gltf(path.to_str().unwrap()).is_err());
    }
}
