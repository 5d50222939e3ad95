//! Template instantiation: visual clone, submesh partitioning, body and
//! collider inference, registration.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use log::{debug, warn};
use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};
use vitrine_assets::{
    AssetStorage, AssetTypeDescriptor, InstanceId, LoadedTemplate, SubmeshRole,
};
use vitrine_core::{
    bounds::Aabb,
    physics::{
        ColliderDefinition, ColliderKind, ColliderShape, PhysicsBody, RigidBodyDefinition,
        ShapeError,
    },
    scene_graph::{Node, NodeContent, NodeId, Scene},
    transform::Transform,
};
use vitrine_physics::PhysicsWorld;

use crate::{
    capabilities::{DisplayPanel, Flip, Rotate},
    error::SpawnError,
};

/// How an instance takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhysicsMode {
    /// Simulated body, synced onto the visual every frame.
    #[default]
    Dynamic,
    /// Externally driven body, always synced.
    Kinematic,
    /// Immovable colliders; the instance itself is static.
    Fixed,
    /// Visual only.
    Disabled,
}

impl PhysicsMode {
    fn body_type(&self) -> Option<PhysicsBody> {
        match self {
            PhysicsMode::Dynamic => Some(PhysicsBody::Dynamic),
            PhysicsMode::Kinematic => Some(PhysicsBody::Kinematic),
            PhysicsMode::Fixed => Some(PhysicsBody::Static),
            PhysicsMode::Disabled => None,
        }
    }

    /// Whether the body is paired with the visual for syncing.
    pub fn is_synced(&self) -> bool {
        matches!(self, PhysicsMode::Dynamic | PhysicsMode::Kinematic)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnOptions {
    pub physics: PhysicsMode,
    /// Shape of the fallback collider; the catalog hint, then a box, otherwise.
    pub collider_type: Option<ColliderKind>,
    /// Keep `col_` submeshes visible.
    pub reveal_colliders: bool,
    /// Overrides the catalog mass.
    pub mass: Option<f32>,
    /// Overrides the catalog scale.
    pub scale: Option<f32>,
}

impl SpawnOptions {
    pub fn visual_only() -> Self {
        Self::default().with_physics(PhysicsMode::Disabled)
    }

    pub fn with_physics(mut self, physics: PhysicsMode) -> Self {
        self.physics = physics;
        self
    }

    pub fn with_collider_type(mut self, kind: ColliderKind) -> Self {
        self.collider_type = Some(kind);
        self
    }

    pub fn revealing_colliders(mut self) -> Self {
        self.reveal_colliders = true;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Handle to a live instance.
#[derive(Debug, Clone)]
pub struct SpawnedAsset {
    pub instance_id: InstanceId,
    pub asset_key: String,
    pub root: NodeId,
    pub body: Option<RigidBodyHandle>,
    pub colliders: Vec<ColliderHandle>,
    pub collision_nodes: Vec<NodeId>,
    /// Renamed plain and activator submeshes.
    pub interactables: Vec<NodeId>,
    pub activators: Vec<NodeId>,
    pub display: Option<DisplayPanel>,
}

impl Rotate for SpawnedAsset {
    fn rotation_node(&self) -> NodeId {
        self.root
    }
}

impl Flip for SpawnedAsset {}

/// Collision submesh geometry bounds plus the matrix into the body frame.
struct ColliderSource {
    kind: ColliderKind,
    bounds: Aabb,
    to_body: Mat4,
}

#[derive(Debug, Default)]
pub struct AssetSpawner {
    revealed: HashMap<InstanceId, Vec<NodeId>>,
}

impl AssetSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one instance of `template` at `position`/`rotation`.
    ///
    /// Inputs and collider dimensions are checked before any body exists; on
    /// failure the partially cloned subtree is removed again.
    #[allow(clippy::too_many_arguments)]
    pub fn instantiate(
        &mut self,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        storage: &mut AssetStorage,
        template: &LoadedTemplate,
        position: Vec3,
        rotation: Quat,
        options: &SpawnOptions,
    ) -> Result<SpawnedAsset, SpawnError> {
        let descriptor = storage.templates().descriptor(&template.key)?.clone();
        let scale = options.scale.unwrap_or(descriptor.scale);

        if !position.is_finite() || !rotation.is_finite() {
            return Err(SpawnError::InvalidInput(format!(
                "non-finite pose {:?} / {:?}",
                position, rotation
            )));
        }
        if rotation.length_squared() <= f32::EPSILON {
            return Err(SpawnError::InvalidInput("zero rotation quaternion".into()));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(SpawnError::InvalidInput(format!(
                "scale must be positive, got {}",
                scale
            )));
        }
        if let Some(mass) = options.mass.filter(|m| !m.is_finite() || *m < 0.0) {
            return Err(SpawnError::InvalidInput(format!(
                "mass must be non-negative, got {}",
                mass
            )));
        }

        let rotation = rotation.normalize();
        let root = clone_template(scene, template, position, rotation, scale);

        let definitions = match options.physics.body_type() {
            Some(_) => {
                let sources = collider_sources(scene, root, template, scale);
                match collider_definitions(scene, root, &sources, &descriptor, options, scale) {
                    Ok(definitions) => definitions,
                    Err(e) => {
                        scene.despawn_recursive(root);
                        return Err(e.into());
                    }
                }
            }
            None => Vec::new(),
        };

        // --- Partition submeshes by role ---
        let mut collision_nodes = Vec::new();
        let mut display_nodes = Vec::new();
        let mut interactables = Vec::new();
        let mut activators = Vec::new();

        for (index, id) in template_nodes(scene, root, template) {
            let source = &template.nodes[index];
            match source.role {
                SubmeshRole::Collision(_) => {
                    if let Some(node) = scene.get_mut(id) {
                        node.visible = options.reveal_colliders;
                    }
                    collision_nodes.push(id);
                }
                SubmeshRole::Display => {
                    let material_key = format!("{}/{}", template.key, source.name);
                    let material =
                        storage.get_or_create_material(&material_key, source.material.as_deref());
                    match scene.get_mut(id).map(|node| &mut node.content) {
                        Some(NodeContent::Mesh {
                            material: current, ..
                        }) => *current = material,
                        _ => warn!("Display submesh '{}' has no mesh", source.name),
                    }
                    display_nodes.push(id);
                }
                SubmeshRole::Activator | SubmeshRole::Plain => {
                    let unique = storage.next_interactable_id(&template.key, &source.name);
                    if let Some(node) = scene.get_mut(id) {
                        node.name = unique.clone();
                        node.user_data.interactable_id = Some(unique);
                    }
                    interactables.push(id);
                    if source.role == SubmeshRole::Activator {
                        activators.push(id);
                    }
                }
            }
        }

        // --- Body + colliders ---
        let mut body = None;
        let mut colliders = Vec::with_capacity(definitions.len());
        if let Some(body_type) = options.physics.body_type() {
            let handle = physics.insert_body(
                &RigidBodyDefinition::new(body_type),
                &Transform::from_translation_rotation(position, rotation),
            );
            let material = descriptor.physics_material();
            for definition in &definitions {
                colliders.push(physics.attach_collider(handle, definition, &material));
            }
            body = Some(handle);
        }

        let synced_body = body.filter(|_| options.physics.is_synced());
        let instance_id =
            storage.register_instance(scene, physics, &template.key, root, synced_body);
        if options.physics == PhysicsMode::Fixed {
            if let Some(anchor) = body {
                storage.set_anchor(instance_id, anchor);
            }
        }

        if options.reveal_colliders && !collision_nodes.is_empty() {
            self.revealed.insert(instance_id, collision_nodes.clone());
        }

        let display = if display_nodes.is_empty() {
            None
        } else {
            Some(DisplayPanel {
                instance_id,
                nodes: display_nodes,
            })
        };

        debug!(
            "Spawned {} as {} ({} colliders, {} interactables)",
            template.key,
            instance_id,
            colliders.len(),
            interactables.len()
        );

        Ok(SpawnedAsset {
            instance_id,
            asset_key: template.key.clone(),
            root,
            body,
            colliders,
            collision_nodes,
            interactables,
            activators,
            display,
        })
    }

    pub fn revealed_colliders(&self, id: InstanceId) -> &[NodeId] {
        self.revealed.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hides every collider submesh left visible at spawn. Returns how many
    /// nodes were hidden.
    pub fn hide_revealed_colliders(&mut self, scene: &mut Scene) -> usize {
        let mut hidden = 0;
        for (_, nodes) in self.revealed.drain() {
            for id in nodes {
                if let Some(node) = scene.get_mut(id) {
                    node.visible = false;
                    hidden += 1;
                }
            }
        }
        hidden
    }

    pub fn forget(&mut self, id: InstanceId) {
        self.revealed.remove(&id);
    }

    pub fn clear(&mut self) {
        self.revealed.clear();
    }
}

/// Deep-clones the template under a new root carrying the instance pose and
/// uniform scale. Geometry and materials stay shared, nodes are per instance.
fn clone_template(
    scene: &mut Scene,
    template: &LoadedTemplate,
    position: Vec3,
    rotation: Quat,
    scale: f32,
) -> NodeId {
    let mut root_node = Node::group(&template.key).with_transform(Transform {
        translation: position,
        rotation,
        scale: Vec3::splat(scale),
    });
    root_node.user_data.asset_key = Some(template.key.clone());
    let root = scene.spawn(root_node);

    let mut lights = Vec::new();
    let mut stack: Vec<(usize, NodeId)> = template.roots.iter().rev().map(|i| (*i, root)).collect();
    while let Some((index, parent)) = stack.pop() {
        let Some(source) = template.nodes.get(index) else {
            continue;
        };

        let content = match (&source.mesh, &source.material, &source.light) {
            (Some(mesh), Some(material), _) => NodeContent::Mesh {
                mesh: mesh.clone(),
                material: material.clone(),
            },
            (_, _, Some(light)) => NodeContent::SpotLight(light.clone()),
            _ => NodeContent::Group,
        };
        let is_light = matches!(content, NodeContent::SpotLight(_));

        let mut node = Node::new(&source.name, content).with_transform(source.transform);
        node.user_data.asset_key = Some(template.key.clone());
        let Some(id) = scene.spawn_child(parent, node) else {
            continue;
        };
        if is_light {
            lights.push(id);
        }
        stack.extend(source.children.iter().rev().map(|c| (*c, id)));
    }

    // light targets are authored node-local
    for id in lights {
        let Some(world) = scene.world_matrix(id) else {
            continue;
        };
        if let Some(node) = scene.get_mut(id) {
            if let NodeContent::SpotLight(light) = &mut node.content {
                light.target = world.transform_point3(light.target);
            }
        }
    }

    root
}

/// Pairs each cloned node with its template index. Clone order matches the
/// template's depth-first order, so the two walks line up.
fn template_nodes(scene: &Scene, root: NodeId, template: &LoadedTemplate) -> Vec<(usize, NodeId)> {
    let mut order = Vec::with_capacity(template.nodes.len());
    let mut stack: Vec<usize> = template.roots.iter().rev().copied().collect();
    while let Some(index) = stack.pop() {
        if let Some(node) = template.nodes.get(index) {
            order.push(index);
            stack.extend(node.children.iter().rev());
        }
    }

    // subtree() starts with the root itself
    let cloned = scene.subtree(root);
    order.into_iter().zip(cloned.into_iter().skip(1)).collect()
}

fn collider_sources(
    scene: &Scene,
    root: NodeId,
    template: &LoadedTemplate,
    scale: f32,
) -> Vec<ColliderSource> {
    let body_frame = Mat4::from_scale(Vec3::splat(scale));

    template_nodes(scene, root, template)
        .into_iter()
        .filter_map(|(index, id)| {
            let source = &template.nodes[index];
            let SubmeshRole::Collision(kind) = source.role else {
                return None;
            };
            let bounds = match &source.mesh {
                Some(mesh) if !mesh.is_empty() => mesh.bounds(),
                _ => {
                    warn!("Collision submesh '{}' has no geometry, skipped", source.name);
                    return None;
                }
            };
            let relative = scene.relative_matrix(root, id)?;
            Some(ColliderSource {
                kind,
                bounds,
                to_body: body_frame * relative,
            })
        })
        .collect()
}

/// Thinnest collider half extent. Flat content (floor planes, posters) is
/// thickened to this instead of being rejected.
pub const MIN_HALF_EXTENT: f32 = 1e-3;

fn thicken(half_extents: Vec3, key: &str) -> Vec3 {
    let thin = |v: f32| v.is_finite() && v < MIN_HALF_EXTENT;
    if !half_extents.to_array().into_iter().any(thin) {
        return half_extents;
    }
    warn!(
        "'{}' has flat collision geometry {:?}, thickening to {}",
        key, half_extents, MIN_HALF_EXTENT
    );
    Vec3::from_array(
        half_extents
            .to_array()
            .map(|v| if thin(v) { MIN_HALF_EXTENT } else { v }),
    )
}

/// One collider per collision submesh, or a single fallback from the whole
/// object's bounds. The requested mass is split evenly.
fn collider_definitions(
    scene: &Scene,
    root: NodeId,
    sources: &[ColliderSource],
    descriptor: &AssetTypeDescriptor,
    options: &SpawnOptions,
    scale: f32,
) -> Result<Vec<ColliderDefinition>, ShapeError> {
    let mut shapes: Vec<(ColliderShape, Transform)> = sources
        .iter()
        .map(|source| {
            let (axis_scale, rotation, _) = source.to_body.to_scale_rotation_translation();
            let center = source.to_body.transform_point3(source.bounds.center());
            let half_extents =
                thicken(source.bounds.half_extents() * axis_scale.abs(), &descriptor.key);
            (
                ColliderShape::fit(source.kind, half_extents),
                Transform::from_translation_rotation(center, rotation),
            )
        })
        .collect();

    if shapes.is_empty() {
        let kind = options
            .collider_type
            .or(descriptor.collider_hint)
            .unwrap_or(ColliderKind::Box);
        let bounds = scene.local_bounds(root);
        let (center, half_extents) = if bounds.is_empty() {
            warn!(
                "'{}' has no geometry, using a unit fallback collider",
                descriptor.key
            );
            (Vec3::ZERO, Vec3::splat(0.5 * scale))
        } else {
            (
                bounds.center() * scale,
                thicken(bounds.half_extents() * scale, &descriptor.key),
            )
        };
        shapes.push((
            ColliderShape::fit(kind, half_extents),
            Transform::from_translation(center),
        ));
    }

    let share = options.mass.unwrap_or(descriptor.mass) / shapes.len() as f32;
    shapes
        .into_iter()
        .map(|(shape, offset)| {
            shape.validate()?;
            let mut definition = ColliderDefinition::new(shape, offset);
            definition.mass = Some(share);
            Ok(definition)
        })
        .collect()
}
