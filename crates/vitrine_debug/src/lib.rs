//! Debug overlay: collider wireframes that follow their bodies, plus spot
//! light cone and direction helpers.
//!
//! Everything here lives in the scene as `NodeContent::Wireframe` nodes and
//! is owned by the manager, never by the asset registry.

use std::{collections::HashMap, sync::Arc};

use glam::{Mat4, Vec3};
use log::{debug, info, warn};
use uuid::Uuid;
use vitrine_assets::{AssetStorage, InstanceRecord, SubmeshRole};
use vitrine_core::{
    mesh::MeshData,
    scene_graph::{Node, NodeContent, NodeId, Scene},
    transform::Transform,
};
use vitrine_physics::PhysicsWorld;

pub mod wireframe;

pub use wireframe::{WireframeOwner, WireframeRecord, color_for_position, is_static_marker};

use crate::wireframe::{COLOR_LIGHT_CONE, COLOR_LIGHT_DIRECTION, COLOR_STATIC};

const CONE_SEGMENTS: u32 = 16;

/// Helper nodes drawn for one spot light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightHelper {
    pub cone: NodeId,
    pub direction: NodeId,
}

#[derive(Debug, Default)]
pub struct DebugVisualizationManager {
    enabled: bool,
    wireframes: HashMap<Uuid, WireframeRecord>,
    light_helpers: HashMap<NodeId, LightHelper>,
}

impl DebugVisualizationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enabling rebuilds every wireframe from scratch; disabling removes all
    /// of them at once.
    pub fn set_enabled(
        &mut self,
        enabled: bool,
        scene: &mut Scene,
        physics: &PhysicsWorld,
        storage: &AssetStorage,
    ) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;

        if enabled {
            let created = self.create_all_wireframes(scene, physics, storage);
            self.update(scene, physics);
            info!("Debug visualization on ({} wireframes)", created);
        } else {
            self.clear(scene);
            info!("Debug visualization off");
        }
    }

    pub fn wireframes(&self) -> impl Iterator<Item = &WireframeRecord> {
        self.wireframes.values()
    }

    pub fn wireframe(&self, uuid: Uuid) -> Option<&WireframeRecord> {
        self.wireframes.get(&uuid)
    }

    pub fn wireframe_count(&self) -> usize {
        self.wireframes.len()
    }

    pub fn light_helper(&self, light: NodeId) -> Option<LightHelper> {
        self.light_helpers.get(&light).copied()
    }

    /// Rebuilds every wireframe. Dynamic instances get their collision
    /// submeshes drawn 1:1, or their bounding box when they have none;
    /// static rooms and floors get a green bounding box.
    pub fn create_all_wireframes(
        &mut self,
        scene: &mut Scene,
        physics: &PhysicsWorld,
        storage: &AssetStorage,
    ) -> usize {
        self.clear_wireframes(scene);

        for record in storage.instances() {
            self.add_instance_wireframes(scene, physics, record);
        }

        debug!("Created {} debug wireframes", self.wireframes.len());
        self.wireframes.len()
    }

    /// Wireframes for one instance, e.g. one spawned while the overlay is
    /// already on. Returns how many were added.
    pub fn add_instance_wireframes(
        &mut self,
        scene: &mut Scene,
        physics: &PhysicsWorld,
        record: &InstanceRecord,
    ) -> usize {
        let before = self.wireframes.len();
        match record.physics_body {
            Some(body) => {
                if physics.bodies.get(body).is_none() {
                    warn!("{} points at a missing body, no wireframe", record.instance_id);
                    return 0;
                }
                let color = color_for_position(record.spawn_position);
                self.add_dynamic_wireframes(scene, record, WireframeOwner::Body(body), color);
            }
            None => {
                let name = scene
                    .get(record.visual_node)
                    .map(|n| n.name.as_str())
                    .unwrap_or_default();
                if is_static_marker(&record.asset_key) || is_static_marker(name) {
                    self.add_bounds_wireframe(
                        scene,
                        record,
                        WireframeOwner::Object(record.visual_node),
                        COLOR_STATIC,
                        true,
                    );
                }
            }
        }
        self.wireframes.len() - before
    }

    fn add_dynamic_wireframes(
        &mut self,
        scene: &mut Scene,
        record: &InstanceRecord,
        owner: WireframeOwner,
        color: [f32; 4],
    ) {
        let root = record.visual_node;
        let Some(root_scale) = scene.get(root).map(|n| n.transform.scale) else {
            warn!("{} has no visual node, no wireframe", record.instance_id);
            return;
        };
        let body_frame = Mat4::from_scale(root_scale);

        let collision: Vec<(Arc<MeshData>, Mat4)> = scene
            .subtree(root)
            .into_iter()
            .filter_map(|id| {
                let node = scene.get(id)?;
                if !SubmeshRole::from_name(&node.name).is_collision() {
                    return None;
                }
                let mesh = node.mesh_data()?.clone();
                let relative = scene.relative_matrix(root, id)?;
                Some((mesh, body_frame * relative))
            })
            .collect();

        if collision.is_empty() {
            self.add_bounds_wireframe(scene, record, owner, color, false);
            return;
        }

        for (mesh, offset) in collision {
            self.insert(scene, mesh, owner, offset, color, false);
        }
    }

    fn add_bounds_wireframe(
        &mut self,
        scene: &mut Scene,
        record: &InstanceRecord,
        owner: WireframeOwner,
        color: [f32; 4],
        is_static: bool,
    ) {
        let bounds = scene.local_bounds(record.visual_node);
        if bounds.is_empty() {
            warn!("{} has no geometry, no wireframe", record.instance_id);
            return;
        }

        // body poses carry no scale, node world matrices do
        let frame = match owner {
            WireframeOwner::Body(_) => scene
                .get(record.visual_node)
                .map(|n| Mat4::from_scale(n.transform.scale))
                .unwrap_or(Mat4::IDENTITY),
            WireframeOwner::Object(_) => Mat4::IDENTITY,
        };
        let mesh = Arc::new(MeshData::cuboid(bounds.half_extents()));
        let offset = frame * Mat4::from_translation(bounds.center());
        self.insert(scene, mesh, owner, offset, color, is_static);
    }

    fn insert(
        &mut self,
        scene: &mut Scene,
        geometry: Arc<MeshData>,
        owner: WireframeOwner,
        offset: Mat4,
        color: [f32; 4],
        is_static: bool,
    ) -> Uuid {
        let uuid = Uuid::new_v4();
        let node = scene.spawn(Node::new(
            format!("debug_wireframe_{}", uuid),
            NodeContent::Wireframe {
                mesh: geometry.clone(),
                color,
            },
        ));
        self.wireframes.insert(
            uuid,
            WireframeRecord {
                uuid,
                node,
                geometry,
                owner,
                is_static,
                offset,
                color,
            },
        );
        uuid
    }

    pub fn remove_wireframe(&mut self, scene: &mut Scene, uuid: Uuid) -> bool {
        match self.wireframes.remove(&uuid) {
            Some(record) => {
                scene.despawn_recursive(record.node);
                true
            }
            None => false,
        }
    }

    /// Re-poses every wireframe and rebuilds the light helpers. Does nothing
    /// while disabled.
    pub fn update(&mut self, scene: &mut Scene, physics: &PhysicsWorld) {
        if !self.enabled {
            return;
        }

        let mut orphaned = Vec::new();
        for record in self.wireframes.values() {
            let owner_matrix = match record.owner {
                WireframeOwner::Body(body) => physics
                    .body_pose(body)
                    .map(|pose| pose.compute_matrix()),
                WireframeOwner::Object(node) => scene.world_matrix(node),
            };
            let Some(owner_matrix) = owner_matrix else {
                orphaned.push(record.uuid);
                continue;
            };
            if let Some(node) = scene.get_mut(record.node) {
                node.transform = Transform::from_matrix(owner_matrix * record.offset);
            }
        }

        for uuid in orphaned {
            warn!("Wireframe {} lost its owner, removing", uuid);
            self.remove_wireframe(scene, uuid);
        }

        self.update_light_helpers(scene);
    }

    fn update_light_helpers(&mut self, scene: &mut Scene) {
        let lights: Vec<(NodeId, Vec3, Vec3, f32)> = scene
            .iter()
            .filter_map(|(id, node)| match &node.content {
                NodeContent::SpotLight(light) => {
                    let position = scene.world_transform(id)?.translation;
                    Some((id, position, light.target, light.angle))
                }
                _ => None,
            })
            .collect();

        // lights that went away take their helpers with them
        let live: Vec<NodeId> = lights.iter().map(|(id, ..)| *id).collect();
        let stale: Vec<NodeId> = self
            .light_helpers
            .keys()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(helper) = self.light_helpers.remove(&id) {
                scene.despawn_recursive(helper.cone);
                scene.despawn_recursive(helper.direction);
            }
        }

        for (id, position, target, angle) in lights {
            let length = position.distance(target);
            let radius = length * angle.tan();
            let cone = Arc::new(MeshData::cone_between(position, target, radius, CONE_SEGMENTS));
            let direction = Arc::new(MeshData::line(position, target));

            let helper = *self.light_helpers.entry(id).or_insert_with(|| LightHelper {
                cone: scene.spawn(Node::new(
                    "debug_light_cone",
                    NodeContent::Wireframe {
                        mesh: cone.clone(),
                        color: COLOR_LIGHT_CONE,
                    },
                )),
                direction: scene.spawn(Node::new(
                    "debug_light_direction",
                    NodeContent::Wireframe {
                        mesh: direction.clone(),
                        color: COLOR_LIGHT_DIRECTION,
                    },
                )),
            });

            for (node, mesh) in [(helper.cone, cone), (helper.direction, direction)] {
                if let Some(NodeContent::Wireframe { mesh: current, .. }) =
                    scene.get_mut(node).map(|n| &mut n.content)
                {
                    *current = mesh;
                }
            }
        }
    }

    fn clear_wireframes(&mut self, scene: &mut Scene) {
        for (_, record) in self.wireframes.drain() {
            scene.despawn_recursive(record.node);
        }
    }

    /// Removes every wireframe and light helper from the scene.
    pub fn clear(&mut self, scene: &mut Scene) {
        self.clear_wireframes(scene);
        for (_, helper) in self.light_helpers.drain() {
            scene.despawn_recursive(helper.cone);
            scene.despawn_recursive(helper.direction);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use glam::Quat;
    use vitrine_assets::{AssetCatalog, MemoryLoader, TemplateCache};
    use vitrine_core::{
        material::MaterialData,
        physics::{PhysicsBody, RigidBodyDefinition},
        scene_graph::SpotLight,
    };
    use vitrine_physics::prepare::{to_rotation, to_vector};

    struct World {
        scene: Scene,
        physics: PhysicsWorld,
        storage: AssetStorage,
        debug: DebugVisualizationManager,
    }

    impl World {
        fn new() -> Self {
            let cache =
                TemplateCache::new(Arc::new(AssetCatalog::new()), Arc::new(MemoryLoader::new()));
            Self {
                scene: Scene::new(),
                physics: PhysicsWorld::default(),
                storage: AssetStorage::new(Arc::new(cache)),
                debug: DebugVisualizationManager::new(),
            }
        }

        /// Root group with one mesh child per `(name, offset)`.
        fn object(&mut self, name: &str, at: Vec3, parts: &[(&str, Vec3)]) -> NodeId {
            let root = self
                .scene
                .spawn(Node::group(name).with_transform(Transform::from_translation(at)));
            for (part, offset) in parts {
                self.scene
                    .spawn_child(
                        root,
                        Node::mesh(
                            *part,
                            Arc::new(MeshData::cuboid(Vec3::splat(0.5))),
                            Arc::new(MaterialData::default()),
                        )
                        .with_transform(Transform::from_translation(*offset)),
                    )
                    .unwrap();
            }
            root
        }

        fn dynamic(&mut self, name: &str, at: Vec3, parts: &[(&str, Vec3)]) -> NodeId {
            let node = self.object(name, at, parts);
            let body = self.physics.insert_body(
                &RigidBodyDefinition::new(PhysicsBody::Dynamic),
                &Transform::from_translation(at),
            );
            self.storage
                .register_instance(&mut self.scene, &self.physics, name, node, Some(body));
            node
        }

        fn enable(&mut self) {
            self.debug
                .set_enabled(true, &mut self.scene, &self.physics, &self.storage);
        }
    }

    #[test]
    fn collision_submeshes_are_drawn_one_to_one() {
        let mut world = World::new();
        world.dynamic(
            "table",
            Vec3::ZERO,
            &[("top", Vec3::Y), ("col_top", Vec3::Y), ("col_leg", Vec3::ZERO)],
        );

        world.enable();

        assert_eq!(world.debug.wireframe_count(), 2);
        assert!(world.debug.wireframes().all(|w| !w.is_static));
        assert!(world
            .debug
            .wireframes()
            .any(|w| w.offset.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::Y, 1e-5)));
    }

    #[test]
    fn objects_without_colliders_get_a_bounding_box() {
        let mut world = World::new();
        world.dynamic("crate", Vec3::new(0.0, 5.0, 0.0), &[("body", Vec3::ZERO)]);

        world.enable();

        let record = world.debug.wireframes().next().unwrap();
        assert_eq!(record.geometry.bounds().half_extents(), Vec3::splat(0.5));
        let node = world.scene.get(record.node).unwrap();
        assert!(node.transform.translation.abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-5));
        assert_eq!(record.color, color_for_position(Vec3::new(0.0, 5.0, 0.0)));
    }

    #[test]
    fn only_rooms_and_floors_get_static_markers() {
        let mut world = World::new();
        let room = world.object("living_room", Vec3::ZERO, &[("walls", Vec3::ZERO)]);
        let vase = world.object("vase", Vec3::X, &[("body", Vec3::ZERO)]);
        world
            .storage
            .register_instance(&mut world.scene, &world.physics, "living_room", room, None);
        world
            .storage
            .register_instance(&mut world.scene, &world.physics, "vase", vase, None);

        world.enable();

        assert_eq!(world.debug.wireframe_count(), 1);
        let record = world.debug.wireframes().next().unwrap();
        assert!(record.is_static);
        assert_eq!(record.color, COLOR_STATIC);
        assert_eq!(record.owner, WireframeOwner::Object(room));
    }

    #[test]
    fn update_follows_the_body() {
        let mut world = World::new();
        let node = world.dynamic("crate", Vec3::ZERO, &[("body", Vec3::ZERO)]);
        world.enable();

        let body = world.storage.dynamic_pairs()[0].1;
        let rigid_body = &mut world.physics.bodies[body];
        rigid_body.set_translation(to_vector(Vec3::new(2.0, 1.0, 0.0)), true);
        rigid_body.set_rotation(to_rotation(Quat::from_rotation_y(0.5)), true);
        world.debug.update(&mut world.scene, &world.physics);

        let record = world.debug.wireframes().next().unwrap();
        let transform = world.scene.get(record.node).unwrap().transform;
        assert!(transform.translation.abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), 1e-5));
        assert!(transform.rotation.abs_diff_eq(Quat::from_rotation_y(0.5), 1e-5));
        // the visual itself is untouched, only the wireframe moved
        assert!(world.scene.get(node).unwrap().transform.translation.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn instances_added_after_enabling_get_wireframes() {
        let mut world = World::new();
        world.enable();
        assert_eq!(world.debug.wireframe_count(), 0);

        let node = world.dynamic("crate", Vec3::ZERO, &[("body", Vec3::ZERO)]);
        let record = world
            .storage
            .instances()
            .find(|r| r.visual_node == node)
            .unwrap()
            .clone();

        let added =
            world
                .debug
                .add_instance_wireframes(&mut world.scene, &world.physics, &record);

        assert_eq!(added, 1);
        assert_eq!(world.debug.wireframe_count(), 1);
        assert_eq!(
            world.debug.wireframes().next().unwrap().owner,
            WireframeOwner::Body(record.physics_body.unwrap())
        );
    }

    #[test]
    fn disabled_manager_does_nothing() {
        let mut world = World::new();
        world.dynamic("crate", Vec3::ZERO, &[("body", Vec3::ZERO)]);
        let before = world.scene.len();

        world.debug.update(&mut world.scene, &world.physics);

        assert_eq!(world.scene.len(), before);
        assert_eq!(world.debug.wireframe_count(), 0);
    }

    #[test]
    fn disabling_removes_every_helper() {
        let mut world = World::new();
        world.dynamic("crate", Vec3::ZERO, &[("body", Vec3::ZERO)]);
        world.scene.spawn(Node::new(
            "spot",
            NodeContent::SpotLight(SpotLight::default()),
        ));
        let before = world.scene.len();

        world.enable();
        assert_eq!(world.scene.len(), before + 3);

        world
            .debug
            .set_enabled(false, &mut world.scene, &world.physics, &world.storage);
        assert_eq!(world.scene.len(), before);
        assert_eq!(world.debug.wireframe_count(), 0);
    }

    #[test]
    fn remove_wireframe_by_uuid() {
        let mut world = World::new();
        world.dynamic("crate", Vec3::ZERO, &[("body", Vec3::ZERO)]);
        world.enable();
        let uuid = world.debug.wireframes().next().unwrap().uuid;

        assert!(world.debug.remove_wireframe(&mut world.scene, uuid));
        assert!(!world.debug.remove_wireframe(&mut world.scene, uuid));
        assert_eq!(world.debug.wireframe_count(), 0);
    }

    #[test]
    fn light_helpers_track_moving_targets() {
        let mut world = World::new();
        let light = world.scene.spawn(
            Node::new(
                "spot",
                NodeContent::SpotLight(SpotLight {
                    target: Vec3::ZERO,
                    ..Default::default()
                }),
            )
            .with_transform(Transform::from_xyz(0.0, 4.0, 0.0)),
        );
        world.enable();

        let helper = world.debug.light_helper(light).unwrap();
        let reach = |world: &World| {
            world
                .scene
                .get(helper.direction)
                .and_then(|n| n.mesh_data())
                .map(|m| m.bounds())
                .unwrap()
        };
        assert!(reach(&world).min.abs_diff_eq(Vec3::ZERO, 1e-5));

        if let Some(NodeContent::SpotLight(spot)) =
            world.scene.get_mut(light).map(|n| &mut n.content)
        {
            spot.target = Vec3::new(3.0, 4.0, 0.0);
        }
        world.debug.update(&mut world.scene, &world.physics);

        assert!(reach(&world).max.abs_diff_eq(Vec3::new(3.0, 4.0, 0.0), 1e-5));
        assert_eq!(world.debug.light_helper(light), Some(helper));

        world.scene.despawn_recursive(light);
        world.debug.update(&mut world.scene, &world.physics);
        assert!(world.debug.light_helper(light).is_none());
        assert!(!world.scene.contains(helper.cone));
    }
}
