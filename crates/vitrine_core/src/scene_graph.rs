//! Arena scene graph.
//!
//! Nodes are addressed by [`NodeId`], allocated monotonically and never
//! reused, so a stale id simply stops resolving once its node is despawned.
//! Geometry and materials are shared through `Arc`; despawning a node drops
//! its references, which is all the "dispose" a CPU-side graph needs.

use std::{collections::HashMap, fmt, sync::Arc};

use glam::{Mat4, Vec3};
use log::{debug, warn};

use crate::{bounds::Aabb, material::MaterialData, mesh::MeshData, transform::Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Cone-shaped light. Position and orientation come from the node; the target
/// is a world-space point that can move independently of the light.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub range: f32,
    /// Outer cone half angle, radians.
    pub angle: f32,
    pub target: Vec3,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            range: 10.0,
            angle: 35.0_f32.to_radians(),
            target: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    Group,
    Mesh {
        mesh: Arc<MeshData>,
        material: Arc<MaterialData>,
    },
    /// Debug-only line rendering of a mesh.
    Wireframe {
        mesh: Arc<MeshData>,
        color: [f32; 4],
    },
    SpotLight(SpotLight),
}

/// Runtime metadata hosts attach to nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserData {
    /// Set by interaction code (dragging, scripted moves) to keep the paired
    /// body awake.
    pub is_moving: bool,
    pub asset_key: Option<String>,
    pub interactable_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub content: NodeContent,
    pub user_data: UserData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, content: NodeContent) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            visible: true,
            content,
            user_data: UserData::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeContent::Group)
    }

    pub fn mesh(name: impl Into<String>, mesh: Arc<MeshData>, material: Arc<MaterialData>) -> Self {
        Self::new(name, NodeContent::Mesh { mesh, material })
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh_data(&self) -> Option<&Arc<MeshData>> {
        match &self.content {
            NodeContent::Mesh { mesh, .. } | NodeContent::Wireframe { mesh, .. } => Some(mesh),
            _ => None,
        }
    }

    pub fn material(&self) -> Option<&Arc<MaterialData>> {
        match &self.content {
            NodeContent::Mesh { material, .. } => Some(material),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children()).unwrap_or(&[])
    }

    /// All nodes, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(move |id| self.nodes.get(&id).map(|n| (id, n)))
    }

    /// Inserts a node at the top level.
    pub fn spawn(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        node.parent = None;
        node.children.clear();
        self.nodes.insert(id, node);
        self.roots.push(id);
        id
    }

    /// Inserts a node under `parent`. Returns `None` if the parent is gone.
    pub fn spawn_child(&mut self, parent: NodeId, node: Node) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let id = self.spawn(node);
        self.add_child(parent, id);
        Some(id)
    }

    /// Moves `child` (and its subtree) under `parent`. Refuses to create cycles.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            debug!("add_child({}, {}): unknown node", parent, child);
            return false;
        }
        if parent == child || self.is_ancestor(child, parent) {
            warn!("Refusing to parent {} under {}: would form a cycle", child, parent);
            return false;
        }

        self.unlink(child);
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
        true
    }

    /// Detaches a node from its parent, making it a top-level node.
    pub fn detach(&mut self, id: NodeId) -> bool {
        if self.parent(id).is_none() {
            return false;
        }
        self.unlink(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        self.roots.push(id);
        true
    }

    fn unlink(&mut self, id: NodeId) {
        match self.parent(id) {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
    }

    /// Removes a node and everything below it. Returns how many nodes were
    /// removed.
    pub fn despawn_recursive(&mut self, id: NodeId) -> usize {
        if !self.contains(id) {
            return 0;
        }
        self.unlink(id);

        let subtree = self.subtree(id);
        for node in &subtree {
            self.nodes.remove(node);
        }
        debug!("Despawned {} ({} nodes)", id, subtree.len());
        subtree.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    /// `id` followed by all of its descendants, depth first.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                out.push(current);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    pub fn traverse<F>(&self, id: NodeId, mut visitor: F)
    where
        F: FnMut(NodeId, &Node),
    {
        for current in self.subtree(id) {
            if let Some(node) = self.nodes.get(&current) {
                visitor(current, node);
            }
        }
    }

    /// True when `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.iter().find(|(_, n)| n.name == name).map(|(id, _)| id)
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(&id)?;
        let mut matrix = node.transform.compute_matrix();
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            matrix = node.transform.compute_matrix() * matrix;
        }
        Some(matrix)
    }

    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        self.world_matrix(id).map(Transform::from_matrix)
    }

    /// Matrix taking `node` space into `ancestor` space. `ancestor` may be
    /// `node` itself.
    pub fn relative_matrix(&self, ancestor: NodeId, node: NodeId) -> Option<Mat4> {
        let mut matrix = Mat4::IDENTITY;
        let mut current = node;
        while current != ancestor {
            let n = self.nodes.get(&current)?;
            matrix = n.transform.compute_matrix() * matrix;
            current = n.parent?;
        }
        Some(matrix)
    }

    /// Bounds of every mesh in the subtree, expressed in `id`'s own frame
    /// (its own transform excluded).
    pub fn local_bounds(&self, id: NodeId) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.traverse(id, |current, node| {
            if let NodeContent::Mesh { mesh, .. } = &node.content {
                if let Some(matrix) = self.relative_matrix(id, current) {
                    bounds = bounds.union(&mesh.bounds().transformed(&matrix));
                }
            }
        });
        bounds
    }

    pub fn world_bounds(&self, id: NodeId) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.traverse(id, |current, node| {
            if let NodeContent::Mesh { mesh, .. } = &node.content {
                if let Some(matrix) = self.world_matrix(current) {
                    bounds = bounds.union(&mesh.bounds().transformed(&matrix));
                }
            }
        });
        bounds
    }
}
