use glam::{Quat, Vec3};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;
use vitrine_core::{
    physics::{
        ColliderDefinition, ColliderShape, PhysicsBody, PhysicsMaterialDefinition,
        RigidBodyDefinition,
    },
    transform::Transform,
};

pub fn to_vector(v: Vec3) -> Vector3<Real> {
    Vector3::new(v.x, v.y, v.z)
}

pub fn from_vector(v: &Vector3<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub fn to_rotation(q: Quat) -> UnitQuaternion<Real> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub fn from_rotation(r: &UnitQuaternion<Real>) -> Quat {
    let c = r.quaternion().coords; // [x, y, z, w] storage order
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

/// Rigid pose of a transform. Scale has no physical meaning and is dropped.
pub fn transform_to_iso(transform: &Transform) -> Isometry3<Real> {
    Isometry3::from_parts(
        Translation3::from(to_vector(transform.translation)),
        to_rotation(transform.rotation),
    )
}

pub fn build_rigid_body(definition: &RigidBodyDefinition, pose: &Transform) -> RigidBody {
    let rb_type = match definition.body_type {
        PhysicsBody::Dynamic => RigidBodyType::Dynamic,
        PhysicsBody::Static => RigidBodyType::Fixed,
        PhysicsBody::Kinematic => RigidBodyType::KinematicPositionBased,
    };

    let mut body = RigidBodyBuilder::new(rb_type)
        .position(transform_to_iso(pose))
        .linear_damping(definition.linear_damping)
        .angular_damping(definition.angular_damping)
        .gravity_scale(definition.gravity_scale)
        .build();

    if let Some(mass) = definition.mass {
        body.set_additional_mass(mass, true);
    }

    body
}

pub fn build_collider(
    definition: &ColliderDefinition,
    material: &PhysicsMaterialDefinition,
) -> Collider {
    let builder = match definition.shape {
        ColliderShape::Box { hx, hy, hz } => ColliderBuilder::cuboid(hx, hy, hz),
        ColliderShape::Sphere { radius } => ColliderBuilder::ball(radius),
        ColliderShape::Capsule {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(half_height, radius),
    };

    let mut builder = builder
        .position(transform_to_iso(&definition.offset))
        .sensor(definition.is_trigger)
        .friction(material.friction)
        .restitution(material.restitution);

    if let Some(mass) = definition.mass {
        builder = builder.mass(mass);
    }

    builder.build()
}
