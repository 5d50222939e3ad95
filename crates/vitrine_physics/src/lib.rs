use glam::Vec3;
use log::debug;
use rapier3d::prelude::*;
use vitrine_core::{
    physics::{ColliderDefinition, PhysicsMaterialDefinition, RigidBodyDefinition},
    transform::Transform,
};

use crate::prepare::{build_collider, build_rigid_body, from_rotation, from_vector, to_vector};

pub mod prepare;
pub mod sync;

pub use rapier3d;
pub use sync::{SyncReport, sync_bodies};

pub struct PhysicsWorld {
    pub pipeline: PhysicsPipeline,
    pub gravity: Vector<Real>,
    pub integration_params: IntegrationParameters,
    pub islands: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub impulse_joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::with_gravity(Vec3::new(0.0, -9.81, 0.0))
    }
}

impl PhysicsWorld {
    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: to_vector(gravity),
            integration_params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Advances the simulation by one step of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    pub fn insert_body(&mut self, definition: &RigidBodyDefinition, pose: &Transform) -> RigidBodyHandle {
        self.bodies.insert(build_rigid_body(definition, pose))
    }

    pub fn attach_collider(
        &mut self,
        body: RigidBodyHandle,
        definition: &ColliderDefinition,
        material: &PhysicsMaterialDefinition,
    ) -> ColliderHandle {
        let collider = build_collider(definition, material);
        self.colliders
            .insert_with_parent(collider, body, &mut self.bodies)
    }

    /// Removes a body together with its colliders and joints.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        let removed = self
            .bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some();
        if removed {
            debug!("Removed rigid body {:?}", handle);
        }
        removed
    }

    /// Current pose of a body (unit scale).
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<Transform> {
        self.bodies.get(handle).map(|body| {
            Transform::from_translation_rotation(
                from_vector(body.translation()),
                from_rotation(body.rotation()),
            )
        })
    }

    /// Drops every body, collider and joint while keeping gravity and
    /// integration settings.
    pub fn clear(&mut self) {
        let gravity = self.gravity;
        let params = self.integration_params.clone();
        *self = Self {
            gravity,
            integration_params: params,
            ..Self::default()
        };
    }
}
