use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

use crate::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsBody {
    Static,
    Dynamic,
    Kinematic,
}

/// Shape family of a collider, before it is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColliderKind {
    #[serde(alias = "cuboid")]
    Box,
    #[serde(alias = "sphere")]
    Ball,
    Capsule,
}

impl ColliderKind {
    /// Naming heuristic for collision submeshes: `sphere`/`ball` and `capsule`
    /// substrings pick those shapes, anything else is a box.
    pub fn from_mesh_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("sphere") || lower.contains("ball") {
            ColliderKind::Ball
        } else if lower.contains("capsule") {
            ColliderKind::Capsule
        } else {
            ColliderKind::Box
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Box { hx: f32, hy: f32, hz: f32 },
    Sphere { radius: f32 },
    /// Y-aligned capsule; `half_height` is the half length of the segment.
    Capsule { radius: f32, half_height: f32 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeError {
    #[error("collider dimension `{name}` must be finite, got {value}")]
    NonFinite { name: &'static str, value: f32 },
    #[error("collider dimension `{name}` must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },
}

impl ColliderShape {
    /// Sizes a shape of `kind` so it encloses a box with the given half extents.
    pub fn fit(kind: ColliderKind, half_extents: Vec3) -> Self {
        match kind {
            ColliderKind::Box => ColliderShape::Box {
                hx: half_extents.x,
                hy: half_extents.y,
                hz: half_extents.z,
            },
            ColliderKind::Ball => ColliderShape::Sphere {
                radius: half_extents.max_element(),
            },
            ColliderKind::Capsule => {
                let radius = half_extents.x.max(half_extents.z);
                ColliderShape::Capsule {
                    radius,
                    half_height: (half_extents.y - radius).max(0.0),
                }
            }
        }
    }

    pub fn kind(&self) -> ColliderKind {
        match self {
            ColliderShape::Box { .. } => ColliderKind::Box,
            ColliderShape::Sphere { .. } => ColliderKind::Ball,
            ColliderShape::Capsule { .. } => ColliderKind::Capsule,
        }
    }

    /// Half extents of the shape's own bounding box.
    pub fn half_extents(&self) -> Vec3 {
        match *self {
            ColliderShape::Box { hx, hy, hz } => Vec3::new(hx, hy, hz),
            ColliderShape::Sphere { radius } => Vec3::splat(radius),
            ColliderShape::Capsule { radius, half_height } => {
                Vec3::new(radius, half_height + radius, radius)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        let dims: Vec<(&'static str, f32)> = match self {
            ColliderShape::Box { hx, hy, hz } => vec![("hx", *hx), ("hy", *hy), ("hz", *hz)],
            ColliderShape::Sphere { radius } => vec![("radius", *radius)],
            ColliderShape::Capsule { radius, half_height } => {
                // a zero-length capsule is a sphere and still valid
                if !half_height.is_finite() {
                    return Err(ShapeError::NonFinite {
                        name: "half_height",
                        value: *half_height,
                    });
                }
                if *half_height < 0.0 {
                    return Err(ShapeError::NonPositive {
                        name: "half_height",
                        value: *half_height,
                    });
                }
                vec![("radius", *radius)]
            }
        };

        for (name, value) in dims {
            if !value.is_finite() {
                return Err(ShapeError::NonFinite { name, value });
            }
            if value <= 0.0 {
                return Err(ShapeError::NonPositive { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RigidBodyDefinition {
    pub body_type: PhysicsBody,
    pub mass: Option<f32>,
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl RigidBodyDefinition {
    pub const DEFAULT_LINEAR_DAMPING: f32 = 0.3;
    pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.5;

    pub fn new(body_type: PhysicsBody) -> Self {
        Self {
            body_type,
            mass: None,
            // explicit so gravity never ends up at zero from an unset default
            gravity_scale: 1.0,
            linear_damping: Self::DEFAULT_LINEAR_DAMPING,
            angular_damping: Self::DEFAULT_ANGULAR_DAMPING,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColliderDefinition {
    pub shape: ColliderShape,
    pub is_trigger: bool,
    /// Pose relative to the owning body.
    pub offset: Transform,
    pub mass: Option<f32>,
}

impl ColliderDefinition {
    pub fn new(shape: ColliderShape, offset: Transform) -> Self {
        Self {
            shape,
            is_trigger: false,
            offset,
            mass: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsMaterialDefinition {
    pub friction: f32,
    pub restitution: f32,
}

impl PhysicsMaterialDefinition {
    pub const DEFAULT_FRICTION: f32 = 0.5;
    pub const DEFAULT_RESTITUTION: f32 = 0.5;
}

impl Default for PhysicsMaterialDefinition {
    fn default() -> Self {
        Self {
            friction: Self::DEFAULT_FRICTION,
            restitution: Self::DEFAULT_RESTITUTION,
        }
    }
}
