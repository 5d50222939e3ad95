use log::debug;
use rapier3d::prelude::RigidBodyHandle;
use vitrine_core::scene_graph::{NodeId, Scene};

use crate::{
    PhysicsWorld,
    prepare::{from_rotation, from_vector},
};

/// What one synchronisation pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub asleep: usize,
    pub woken: usize,
    pub missing: usize,
}

/// Copies body poses onto their paired nodes.
///
/// Sleeping bodies are left alone unless they are kinematic (their motion is
/// driven from outside the solver). A node flagged `is_moving` wakes its
/// sleeping body first. Poses are copied verbatim, scale stays untouched.
pub fn sync_bodies<I>(pairs: I, scene: &mut Scene, physics: &mut PhysicsWorld) -> SyncReport
where
    I: IntoIterator<Item = (NodeId, RigidBodyHandle)>,
{
    let mut report = SyncReport::default();

    for (node_id, body_handle) in pairs {
        let (Some(node), Some(body)) = (scene.get_mut(node_id), physics.bodies.get_mut(body_handle))
        else {
            debug!("Skipping sync for {} / {:?}: pair no longer exists", node_id, body_handle);
            report.missing += 1;
            continue;
        };

        if node.user_data.is_moving && body.is_sleeping() {
            body.wake_up(true);
            report.woken += 1;
        }

        if body.is_sleeping() && !body.is_kinematic() {
            report.asleep += 1;
            continue;
        }

        node.transform.translation = from_vector(body.translation());
        node.transform.rotation = from_rotation(body.rotation());
        report.synced += 1;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use nalgebra::Vector3;
    use vitrine_core::{
        physics::{PhysicsBody, RigidBodyDefinition},
        scene_graph::Node,
        transform::Transform,
    };

    use crate::prepare::to_rotation;

    fn pair(
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        body_type: PhysicsBody,
    ) -> (NodeId, RigidBodyHandle) {
        let node = scene.spawn(Node::group("probe"));
        let body = physics.insert_body(&RigidBodyDefinition::new(body_type), &Transform::IDENTITY);
        (node, body)
    }

    #[test]
    fn copies_pose_of_awake_body() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::default();
        let (node, body) = pair(&mut scene, &mut physics, PhysicsBody::Dynamic);

        let rotation = Quat::from_rotation_z(0.3);
        let rb = &mut physics.bodies[body];
        rb.set_translation(Vector3::new(0.0, 4.9, 0.0), true);
        rb.set_rotation(to_rotation(rotation), true);

        let report = sync_bodies([(node, body)], &mut scene, &mut physics);

        assert_eq!(report.synced, 1);
        let transform = scene.get(node).unwrap().transform;
        assert!(transform.translation.abs_diff_eq(Vec3::new(0.0, 4.9, 0.0), 1e-6));
        assert!(transform.rotation.abs_diff_eq(rotation, 1e-6));
    }

    #[test]
    fn sleeping_dynamic_body_is_skipped() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::default();
        let (node, body) = pair(&mut scene, &mut physics, PhysicsBody::Dynamic);

        let rb = &mut physics.bodies[body];
        rb.set_translation(Vector3::new(3.0, 0.0, 0.0), false);
        rb.sleep();
        assert!(rb.is_sleeping());

        let report = sync_bodies([(node, body)], &mut scene, &mut physics);

        assert_eq!(report.asleep, 1);
        assert_eq!(scene.get(node).unwrap().transform.translation, Vec3::ZERO);
    }

    #[test]
    fn sleeping_kinematic_body_still_syncs() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::default();
        let (node, body) = pair(&mut scene, &mut physics, PhysicsBody::Kinematic);

        let rb = &mut physics.bodies[body];
        rb.set_translation(Vector3::new(0.0, 0.0, 2.0), false);
        rb.sleep();

        let report = sync_bodies([(node, body)], &mut scene, &mut physics);

        assert_eq!(report.synced, 1);
        assert!(
            scene
                .get(node)
                .unwrap()
                .transform
                .translation
                .abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-6)
        );
    }

    #[test]
    fn moving_flag_wakes_sleeping_body() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::default();
        let (node, body) = pair(&mut scene, &mut physics, PhysicsBody::Dynamic);

        physics.bodies[body].sleep();
        scene.get_mut(node).unwrap().user_data.is_moving = true;

        let report = sync_bodies([(node, body)], &mut scene, &mut physics);

        assert_eq!(report.woken, 1);
        assert_eq!(report.synced, 1);
        assert!(!physics.bodies[body].is_sleeping());
    }

    #[test]
    fn dangling_pairs_are_counted_not_fatal() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::default();
        let (node, body) = pair(&mut scene, &mut physics, PhysicsBody::Dynamic);
        physics.remove_body(body);

        let report = sync_bodies([(node, body)], &mut scene, &mut physics);
        assert_eq!(report.missing, 1);
    }
}
