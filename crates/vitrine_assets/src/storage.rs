//! AssetStorage: the registry of spawned instances and the shared material
//! cache, sitting on top of the template cache.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
    sync::Arc,
};

use glam::Vec3;
use log::{debug, info};
use rapier3d::prelude::RigidBodyHandle;
use vitrine_core::{
    material::MaterialData,
    scene_graph::{NodeId, Scene},
};
use vitrine_physics::PhysicsWorld;

use crate::cache::TemplateCache;

/// Process-unique instance identifier, rendered as `instance_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance_{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("instance_")
            .and_then(|n| n.parse().ok())
            .map(InstanceId)
            .ok_or_else(|| format!("'{}' is not an instance id", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub instance_id: InstanceId,
    pub asset_key: String,
    pub visual_node: NodeId,
    /// Present for dynamic instances, which take part in the sync loop.
    pub physics_body: Option<RigidBodyHandle>,
    /// Immovable body owned by a static instance (fixed colliders).
    pub anchor_body: Option<RigidBodyHandle>,
    /// World position right after registration.
    pub spawn_position: Vec3,
}

impl InstanceRecord {
    pub fn is_dynamic(&self) -> bool {
        self.physics_body.is_some()
    }

    fn bodies(&self) -> impl Iterator<Item = RigidBodyHandle> {
        self.physics_body.into_iter().chain(self.anchor_body)
    }
}

/// A visual node paired with the body that drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstancePair {
    pub instance_id: InstanceId,
    pub visual_node: NodeId,
    pub physics_body: RigidBodyHandle,
}

pub struct AssetStorage {
    templates: Arc<TemplateCache>,
    records: BTreeMap<InstanceId, InstanceRecord>,
    body_to_instance: HashMap<RigidBodyHandle, InstanceId>,
    materials: HashMap<String, Arc<MaterialData>>,
    next_instance: u64,
    next_interactable: u64,
}

impl AssetStorage {
    pub fn new(templates: Arc<TemplateCache>) -> Self {
        Self {
            templates,
            records: BTreeMap::new(),
            body_to_instance: HashMap::new(),
            materials: HashMap::new(),
            next_instance: 0,
            next_interactable: 0,
        }
    }

    pub fn templates(&self) -> &Arc<TemplateCache> {
        &self.templates
    }

    /// Registers a spawned node. With a body, the node's pose is seeded from
    /// the body so the first rendered frame already matches the simulation.
    pub fn register_instance(
        &mut self,
        scene: &mut Scene,
        physics: &PhysicsWorld,
        asset_key: &str,
        visual_node: NodeId,
        physics_body: Option<RigidBodyHandle>,
    ) -> InstanceId {
        let instance_id = InstanceId(self.next_instance);
        self.next_instance += 1;

        if let Some(pose) = physics_body.and_then(|body| physics.body_pose(body)) {
            if let Some(node) = scene.get_mut(visual_node) {
                node.transform.translation = pose.translation;
                node.transform.rotation = pose.rotation;
            }
        }

        let spawn_position = scene
            .world_transform(visual_node)
            .map(|t| t.translation)
            .unwrap_or(Vec3::ZERO);

        if let Some(body) = physics_body {
            self.body_to_instance.insert(body, instance_id);
        }
        self.records.insert(
            instance_id,
            InstanceRecord {
                instance_id,
                asset_key: asset_key.to_string(),
                visual_node,
                physics_body,
                anchor_body: None,
                spawn_position,
            },
        );

        debug!(
            "Registered {} ({}) as {}",
            instance_id,
            asset_key,
            if physics_body.is_some() { "dynamic" } else { "static" }
        );
        instance_id
    }

    /// Attaches an immovable body to a static instance so disposal removes it.
    pub fn set_anchor(&mut self, id: InstanceId, body: RigidBodyHandle) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.anchor_body = Some(body);
                self.body_to_instance.insert(body, id);
                true
            }
            None => false,
        }
    }

    pub fn get_instance(&self, id: InstanceId) -> Option<&InstanceRecord> {
        self.records.get(&id)
    }

    pub fn instance_for_body(&self, body: RigidBodyHandle) -> Option<InstanceId> {
        self.body_to_instance.get(&body).copied()
    }

    /// All records in allocation order.
    pub fn instances(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dynamic_pairs(&self) -> Vec<(NodeId, RigidBodyHandle)> {
        self.records
            .values()
            .filter_map(|r| r.physics_body.map(|body| (r.visual_node, body)))
            .collect()
    }

    /// Resolves any node to the dynamic instance owning it: the instance's own
    /// node first, then hierarchy containment either way, then name.
    pub fn find_pair_by_visual_node(&self, scene: &Scene, node: NodeId) -> Option<InstancePair> {
        let pairs = || {
            self.records.values().filter_map(|r| {
                r.physics_body.map(|body| InstancePair {
                    instance_id: r.instance_id,
                    visual_node: r.visual_node,
                    physics_body: body,
                })
            })
        };

        if let Some(pair) = pairs().find(|p| p.visual_node == node) {
            return Some(pair);
        }

        if let Some(pair) = pairs().find(|p| {
            scene.is_ancestor(p.visual_node, node) || scene.is_ancestor(node, p.visual_node)
        }) {
            return Some(pair);
        }

        let name = &scene.get(node)?.name;
        pairs().find(|p| {
            scene
                .subtree(p.visual_node)
                .into_iter()
                .any(|id| scene.get(id).is_some_and(|n| &n.name == name))
        })
    }

    pub fn find_pair_by_name(&self, scene: &Scene, name: &str) -> Option<InstancePair> {
        let node = scene.find_by_name(name)?;
        self.find_pair_by_visual_node(scene, node)
    }

    /// Same key, same material: the first call fixes the instance every later
    /// call returns. Without a template the material is a default named after
    /// the key.
    pub fn get_or_create_material(
        &mut self,
        key: &str,
        template: Option<&MaterialData>,
    ) -> Arc<MaterialData> {
        self.materials
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(
                    template
                        .cloned()
                        .unwrap_or_else(|| MaterialData::named(key)),
                )
            })
            .clone()
    }

    /// Globally unique name for an interactable submesh.
    pub fn next_interactable_id(&mut self, asset_key: &str, name: &str) -> String {
        let id = format!("{}_{}_{}", asset_key, name, self.next_interactable);
        self.next_interactable += 1;
        id
    }

    /// Removes one instance: its visual subtree, its bodies (with their
    /// colliders) and its record. Unknown ids return `false`.
    pub fn dispose_instance(
        &mut self,
        id: InstanceId,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
    ) -> bool {
        let Some(record) = self.records.remove(&id) else {
            return false;
        };

        let removed_nodes = scene.despawn_recursive(record.visual_node);
        for body in record.bodies() {
            self.body_to_instance.remove(&body);
            physics.remove_body(body);
        }
        debug!("Disposed {} ({} nodes)", id, removed_nodes);
        true
    }

    /// Full teardown: every instance, the material cache, the template cache
    /// and both counters.
    pub fn cleanup(&mut self, scene: &mut Scene, physics: &mut PhysicsWorld) {
        let count = self.records.len();
        for record in std::mem::take(&mut self.records).into_values() {
            scene.despawn_recursive(record.visual_node);
            for body in record.bodies() {
                physics.remove_body(body);
            }
        }

        self.body_to_instance.clear();
        self.materials.clear();
        self.templates.clear();
        self.next_instance = 0;
        self.next_interactable = 0;
        info!("Asset storage cleaned up ({} instances)", count);
    }
}
