use std::path::Path;

use vitrine_core::material::MaterialData;
use vitrine_core::mesh::{MeshData, Vertex};

use crate::scene::{SceneData, SceneNode};

/// Every OBJ object becomes a mesh node under one root named after the file,
/// so object names carry the same `col_` / `display_` conventions as glTF.
pub fn parse_obj(path: &str) -> Result<SceneData, String> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )
    .map_err(|e| e.to_string())?;

    let mut scene = SceneData::default();

    // A missing .mtl is not fatal; meshes fall back to the template default.
    if let Ok(materials) = materials {
        for material in materials {
            let mut data = MaterialData::named(material.name);
            if let Some([r, g, b]) = material.diffuse {
                data = data.with_base_color([r, g, b, material.dissolve.unwrap_or(1.0)]);
            }
            scene.add_material(data);
        }
    }

    let root_name = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("obj");
    let root = scene.add_node(SceneNode::new(root_name));

    for model in models {
        let mesh = &model.mesh;
        let vertex_count = mesh.positions.len() / 3;

        let vertices = (0..vertex_count)
            .map(|i| Vertex {
                position: [
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ],
                normal: if mesh.normals.len() >= (i + 1) * 3 {
                    [mesh.normals[i * 3], mesh.normals[i * 3 + 1], mesh.normals[i * 3 + 2]]
                } else {
                    [0.0, 1.0, 0.0]
                },
                uv: if mesh.texcoords.len() >= (i + 1) * 2 {
                    [mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1]]
                } else {
                    [0.0, 0.0]
                },
            })
            .collect();

        let mesh_index = scene.add_mesh(MeshData {
            vertices,
            indices: mesh.indices.clone(),
        });

        let mut node = SceneNode::new(model.name).with_mesh(mesh_index);
        if let Some(material) = mesh.material_id.filter(|i| *i < scene.materials.len()) {
            node = node.with_material(material);
        }
        scene.add_child(root, node);
    }

    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CRATE_OBJ: &str = "\
o body
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
f 1 2 3
o col_box
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 4 5 6
";

    #[test]
    fn objects_become_children_of_a_root_named_after_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crate.obj");
        std::fs::write(&path, CRATE_OBJ).unwrap();

        let scene = parse_obj(path.to_str().unwrap()).unwrap();

        assert_eq!(scene.nodes.len(), 3);
        assert_eq!(scene.nodes[0].name, "crate");
        assert_eq!(scene.nodes[0].children, vec![1, 2]);

        let names: Vec<_> = scene.nodes[1..].iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["body", "col_box"]);
        for node in &scene.nodes[1..] {
            let mesh = &scene.meshes[node.mesh_index.unwrap()];
            assert_eq!(mesh.vertices.len(), 3);
            assert_eq!(mesh.indices.len(), 3);
            // no mtllib, so no material either
            assert_eq!(node.material_index, None);
        }
    }
}
