//! Templates: loader output classified once into typed submesh roles.

use std::sync::Arc;

use log::warn;
use vitrine_core::{
    material::MaterialData,
    mesh::MeshData,
    physics::ColliderKind,
    scene_graph::SpotLight,
    transform::Transform,
};

use crate::{error::AssetError, scene::SceneData};

pub const COLLISION_PREFIX: &str = "col_";
pub const DISPLAY_PREFIX: &str = "display_";
pub const ACTIVATOR_PREFIX: &str = "activate_";

/// What a template node is for, derived from its authored name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmeshRole {
    /// Collider source, hidden from rendering by default.
    Collision(ColliderKind),
    /// Screen-like surface with its own material.
    Display,
    /// Clickable trigger.
    Activator,
    Plain,
}

impl SubmeshRole {
    pub fn from_name(name: &str) -> Self {
        if let Some(rest) = name.strip_prefix(COLLISION_PREFIX) {
            SubmeshRole::Collision(ColliderKind::from_mesh_name(rest))
        } else if name.starts_with(DISPLAY_PREFIX) {
            SubmeshRole::Display
        } else if name.starts_with(ACTIVATOR_PREFIX) {
            SubmeshRole::Activator
        } else {
            SubmeshRole::Plain
        }
    }

    pub fn is_collision(&self) -> bool {
        matches!(self, SubmeshRole::Collision(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub name: String,
    pub role: SubmeshRole,
    pub transform: Transform,
    pub mesh: Option<Arc<MeshData>>,
    pub material: Option<Arc<MaterialData>>,
    pub light: Option<SpotLight>,
    pub children: Vec<usize>,
}

/// Immutable, loaded-once representation of an asset type. Shared by every
/// instance through `Arc`.
#[derive(Debug, PartialEq)]
pub struct LoadedTemplate {
    pub key: String,
    pub nodes: Vec<TemplateNode>,
    pub roots: Vec<usize>,
}

impl LoadedTemplate {
    pub fn from_scene(key: impl Into<String>, data: SceneData) -> Result<Self, AssetError> {
        let key = key.into();
        let SceneData {
            meshes,
            materials,
            nodes,
        } = data;

        let meshes: Vec<Arc<MeshData>> = meshes.into_iter().map(Arc::new).collect();
        let materials: Vec<Arc<MaterialData>> = materials.into_iter().map(Arc::new).collect();
        let fallback_material = Arc::new(MaterialData::named(format!("{}_default", key)));

        // every node may have at most one parent
        let mut has_parent = vec![false; nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            for &child in &node.children {
                if child >= nodes.len() || child == index {
                    return Err(AssetError::load(
                        &key,
                        format!("node '{}' references invalid child {}", node.name, child),
                    ));
                }
                if has_parent[child] {
                    return Err(AssetError::load(
                        &key,
                        format!("node {} has more than one parent", child),
                    ));
                }
                has_parent[child] = true;
            }
        }

        let roots: Vec<usize> = (0..nodes.len()).filter(|i| !has_parent[*i]).collect();
        if roots.is_empty() && !nodes.is_empty() {
            return Err(AssetError::load(&key, "node hierarchy has no root"));
        }

        let nodes = nodes
            .into_iter()
            .map(|node| {
                let mesh = node.mesh_index.and_then(|i| {
                    let mesh = meshes.get(i).cloned();
                    if mesh.is_none() {
                        warn!("'{}': node '{}' points at missing mesh {}", key, node.name, i);
                    }
                    mesh
                });
                let material = mesh.as_ref().map(|_| {
                    node.material_index
                        .and_then(|i| materials.get(i).cloned())
                        .unwrap_or_else(|| fallback_material.clone())
                });

                TemplateNode {
                    role: SubmeshRole::from_name(&node.name),
                    name: node.name,
                    transform: node.transform,
                    mesh,
                    material,
                    light: node.light,
                    children: node.children,
                }
            })
            .collect();

        Ok(Self { key, nodes, roots })
    }

    pub fn count_role(&self, predicate: impl Fn(&SubmeshRole) -> bool) -> usize {
        self.nodes.iter().filter(|n| predicate(&n.role)).count()
    }

    pub fn has_collision_submeshes(&self) -> bool {
        self.count_role(SubmeshRole::is_collision) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneNode;
    use glam::Vec3;

    #[test]
    fn roles_come_from_prefixes() {
        assert_eq!(
            SubmeshRole::from_name("col_sphere_01"),
            SubmeshRole::Collision(ColliderKind::Ball)
        );
        assert_eq!(
            SubmeshRole::from_name("col_wall"),
            SubmeshRole::Collision(ColliderKind::Box)
        );
        assert_eq!(SubmeshRole::from_name("display_screen"), SubmeshRole::Display);
        assert_eq!(SubmeshRole::from_name("activate_button"), SubmeshRole::Activator);
        assert_eq!(SubmeshRole::from_name("lid"), SubmeshRole::Plain);
        assert_eq!(SubmeshRole::from_name("my_col_thing"), SubmeshRole::Plain);
    }

    #[test]
    fn classifies_nodes_and_finds_roots() {
        let mut data = SceneData::default();
        let root = data.add_node(SceneNode::new("crate"));
        data.add_mesh_node(
            Some(root),
            "col_box",
            MeshData::cuboid(Vec3::ONE),
            MaterialData::default(),
            Transform::IDENTITY,
        );
        let body_mesh = data.add_mesh(MeshData::cuboid(Vec3::ONE));
        data.add_child(root, SceneNode::new("body").with_mesh(body_mesh));

        let template = LoadedTemplate::from_scene("crate", data).unwrap();

        assert_eq!(template.roots, vec![0]);
        assert!(template.has_collision_submeshes());
        assert_eq!(template.nodes[1].role, SubmeshRole::Collision(ColliderKind::Box));
        // mesh without a material falls back to the shared default
        assert_eq!(
            template.nodes[2].material.as_ref().unwrap().name,
            "crate_default"
        );
        assert!(template.nodes[0].material.is_none());
    }

    #[test]
    fn rejects_shared_children() {
        let mut data = SceneData::default();
        let a = data.add_node(SceneNode::new("a"));
        let b = data.add_node(SceneNode::new("b"));
        let c = data.add_child(a, SceneNode::new("c"));
        data.nodes[b].children.push(c);

        assert!(matches!(
            LoadedTemplate::from_scene("bad", data),
            Err(AssetError::Load { .. })
        ));
    }
}
