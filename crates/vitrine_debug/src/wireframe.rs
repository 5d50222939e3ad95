use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};

use glam::{Mat4, Vec3};
use rapier3d::prelude::RigidBodyHandle;
use uuid::Uuid;
use vitrine_core::{mesh::MeshData, scene_graph::NodeId};

// Configuration
pub const COLOR_STATIC: [f32; 4] = [0.0, 1.0, 0.0, 1.0]; // Rooms and floors
pub const COLOR_LIGHT_CONE: [f32; 4] = [1.0, 0.9, 0.3, 0.6];
pub const COLOR_LIGHT_DIRECTION: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

const STATIC_NAME_HINTS: [&str; 2] = ["room", "floor"];

/// What a wireframe follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireframeOwner {
    Body(RigidBodyHandle),
    Object(NodeId),
}

#[derive(Debug, Clone)]
pub struct WireframeRecord {
    pub uuid: Uuid,
    /// Scene node drawing the lines.
    pub node: NodeId,
    pub geometry: Arc<MeshData>,
    pub owner: WireframeOwner,
    pub is_static: bool,
    /// Geometry frame relative to the owner's frame (body pose or node world).
    pub offset: Mat4,
    pub color: [f32; 4],
}

/// Static instances only get a marker when their key or name says room/floor.
pub fn is_static_marker(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    STATIC_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Stable per-instance colour derived from where it was spawned.
pub fn color_for_position(position: Vec3) -> [f32; 4] {
    let mut hasher = DefaultHasher::new();
    for component in position.to_array() {
        // -0.0 and 0.0 should land on the same colour
        (component + 0.0).to_bits().hash(&mut hasher);
    }
    let hue = (hasher.finish() % 360) as f32 / 360.0;
    let [r, g, b] = hsl_to_rgb(hue, 0.8, 0.55);
    [r, g, b, 1.0]
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s == 0.0 {
        return [l, l, l];
    }

    let hue_to_rgb = |p: f32, q: f32, mut t: f32| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            return p + (q - p) * 6.0 * t;
        }
        if t < 1.0 / 2.0 {
            return q;
        }
        if t < 2.0 / 3.0 {
            return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
        }
        p
    };

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    [
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_colors_are_stable() {
        let a = color_for_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(a, color_for_position(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(color_for_position(Vec3::ZERO), color_for_position(Vec3::splat(-0.0)));
        assert!(a.iter().all(|c| (0.0..=1.0).contains(c)));
    }

    #[test]
    fn static_marker_names() {
        assert!(is_static_marker("living_room"));
        assert!(is_static_marker("Floor_01"));
        assert!(!is_static_marker("crate"));
    }

    #[test]
    fn hsl_primaries() {
        let red = hsl_to_rgb(0.0, 1.0, 0.5);
        assert!((red[0] - 1.0).abs() < 1e-5 && red[1].abs() < 1e-5 && red[2].abs() < 1e-5);
        assert_eq!(hsl_to_rgb(0.3, 0.0, 0.4), [0.4, 0.4, 0.4]);
    }
}
