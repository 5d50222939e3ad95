//! Behaviour a spawned object offers, expressed as traits on its handle.

use std::{f32::consts::PI, sync::Arc, time::Duration};

use glam::Vec3;
use log::warn;
use vitrine_core::{
    material::MaterialData,
    scene_graph::{NodeContent, NodeId, Scene},
};
use vitrine_assets::InstanceId;

use crate::{
    error::RotationError,
    rotator::{AssetRotator, HalfwayCallback, RotationOptions, RotationTask},
};

pub trait Rotate {
    /// Node the rotation is applied to.
    fn rotation_node(&self) -> NodeId;

    fn rotate(
        &self,
        rotator: &mut AssetRotator,
        scene: &Scene,
        axis: Vec3,
        radians: f32,
        duration: Duration,
        options: RotationOptions,
    ) -> Result<RotationTask, RotationError> {
        rotator.rotate_asset(scene, self.rotation_node(), axis, radians, duration, options)
    }
}

/// Half turn, typically to show the back of a double-sided object. The
/// halfway callback is where the visible face gets swapped.
pub trait Flip: Rotate {
    fn flip_axis(&self) -> Vec3 {
        Vec3::X
    }

    fn flip(
        &self,
        rotator: &mut AssetRotator,
        scene: &Scene,
        duration: Duration,
        on_halfway: Option<HalfwayCallback>,
    ) -> Result<RotationTask, RotationError> {
        let options = RotationOptions {
            on_halfway,
            ..Default::default()
        };
        self.rotate(rotator, scene, self.flip_axis(), PI, duration, options)
    }
}

/// Screens: show, hide or re-skin every display submesh of one object.
pub trait DisplaySwitch {
    fn display_nodes(&self) -> &[NodeId];

    /// Swaps the material of every display mesh. Returns how many changed.
    fn set_display_material(&self, scene: &mut Scene, material: Arc<MaterialData>) -> usize {
        let mut changed = 0;
        for id in self.display_nodes() {
            match scene.get_mut(*id).map(|node| &mut node.content) {
                Some(NodeContent::Mesh { material: current, .. }) => {
                    *current = material.clone();
                    changed += 1;
                }
                Some(_) => {}
                None => warn!("Display node {} is gone", id),
            }
        }
        changed
    }

    fn set_display_visible(&self, scene: &mut Scene, visible: bool) -> usize {
        let mut changed = 0;
        for id in self.display_nodes() {
            if let Some(node) = scene.get_mut(*id) {
                node.visible = visible;
                changed += 1;
            }
        }
        changed
    }

    /// Flips visibility based on the first display node. Returns the new state.
    fn toggle_display(&self, scene: &mut Scene) -> bool {
        let visible = self
            .display_nodes()
            .first()
            .and_then(|id| scene.get(*id))
            .is_some_and(|node| node.visible);
        self.set_display_visible(scene, !visible);
        !visible
    }
}

/// Handle over the display submeshes of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayPanel {
    pub instance_id: InstanceId,
    pub nodes: Vec<NodeId>,
}

impl DisplaySwitch for DisplayPanel {
    fn display_nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::{mesh::MeshData, scene_graph::Node};

    struct Card(NodeId);

    impl Rotate for Card {
        fn rotation_node(&self) -> NodeId {
            self.0
        }
    }

    impl Flip for Card {}

    #[test]
    fn flip_is_a_half_turn() {
        let mut scene = Scene::new();
        let card = Card(scene.spawn(Node::group("card")));
        let mut rotator = AssetRotator::new();

        card.flip(&mut rotator, &scene, Duration::from_millis(200), None)
            .unwrap();
        rotator.update(&mut scene, Duration::from_millis(200));

        let rotation = scene.get(card.0).unwrap().transform.rotation;
        assert!((rotation * Vec3::Y).abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }

    #[test]
    fn display_switch_reskins_and_toggles() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::group("monitor"));
        let screen = scene
            .spawn_child(
                root,
                Node::mesh(
                    "display_screen",
                    Arc::new(MeshData::cuboid(Vec3::ONE)),
                    Arc::new(MaterialData::named("off")),
                ),
            )
            .unwrap();
        let panel = DisplayPanel {
            instance_id: "instance_0".parse().unwrap(),
            nodes: vec![screen],
        };

        let on = Arc::new(MaterialData::named("on"));
        assert_eq!(panel.set_display_material(&mut scene, on.clone()), 1);
        assert!(Arc::ptr_eq(scene.get(screen).unwrap().material().unwrap(), &on));

        assert!(!panel.toggle_display(&mut scene));
        assert!(!scene.get(screen).unwrap().visible);
        assert!(panel.toggle_display(&mut scene));
    }
}
