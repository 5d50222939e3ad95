use glam::{Quat, Vec3};

use crate::bounds::Aabb;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3], // Flat arrays keep loaders simple
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn at(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: [0.0, 1.0, 0.0],
            uv: [0.0, 0.0],
        }
    }
}

/// Triangle (or line-list, for helpers) geometry. Shared read-only between
/// instances through `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().map(|v| Vec3::from_array(v.position))
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions())
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Appends another mesh, re-basing its indices.
    pub fn append(&mut self, other: &MeshData) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Box centred on the origin.
    pub fn cuboid(half_extents: Vec3) -> Self {
        let h = half_extents;
        // (normal, tangent u, tangent v) per face
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut mesh = MeshData::default();
        for (normal, u, v) in faces {
            let base = mesh.vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (normal + u * su + v * sv) * h;
                mesh.vertices.push(Vertex {
                    position: p.to_array(),
                    normal: normal.to_array(),
                    uv: [(su + 1.0) * 0.5, (sv + 1.0) * 0.5],
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Cone with its apex at the origin, opening along -Y.
    pub fn cone(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let mut mesh = MeshData::default();
        mesh.vertices.push(Vertex::at(Vec3::ZERO));

        for i in 0..segments {
            let angle = i as f32 / segments as f32 * std::f32::consts::TAU;
            let rim = Vec3::new(angle.cos() * radius, -height, angle.sin() * radius);
            mesh.vertices.push(Vertex::at(rim));
        }

        let base_center = mesh.vertices.len() as u32;
        mesh.vertices.push(Vertex::at(Vec3::new(0.0, -height, 0.0)));

        for i in 0..segments {
            let a = 1 + i;
            let b = 1 + (i + 1) % segments;
            mesh.indices.extend_from_slice(&[0, b, a]);
            mesh.indices.extend_from_slice(&[base_center, a, b]);
        }
        mesh
    }

    /// Two-vertex line list.
    pub fn line(start: Vec3, end: Vec3) -> Self {
        MeshData {
            vertices: vec![Vertex::at(start), Vertex::at(end)],
            indices: vec![0, 1],
        }
    }

    /// Cone helper between two points: apex at `apex`, base disc centred on
    /// `base_center`.
    pub fn cone_between(apex: Vec3, base_center: Vec3, radius: f32, segments: u32) -> Self {
        let axis = base_center - apex;
        let height = axis.length();
        let mut mesh = MeshData::cone(radius, height, segments);
        if height <= f32::EPSILON {
            return mesh;
        }

        let rotation = Quat::from_rotation_arc(Vec3::NEG_Y, axis / height);
        for v in &mut mesh.vertices {
            let p = apex + rotation * Vec3::from_array(v.position);
            v.position = p.to_array();
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_bounds_match_half_extents() {
        let mesh = MeshData::cuboid(Vec3::new(1.0, 2.0, 3.0));
        let bounds = mesh.bounds();

        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!(bounds.half_extents().abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
        assert!(bounds.center().abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn append_rebases_indices() {
        let mut a = MeshData::line(Vec3::ZERO, Vec3::X);
        let b = MeshData::line(Vec3::Y, Vec3::Z);
        a.append(&b);

        assert_eq!(a.vertices.len(), 4);
        assert_eq!(a.indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn cone_between_reaches_the_base() {
        let apex = Vec3::new(0.0, 5.0, 0.0);
        let base = Vec3::new(3.0, 5.0, 0.0);
        let mesh = MeshData::cone_between(apex, base, 1.0, 8);
        let bounds = mesh.bounds();

        assert!((bounds.max.x - 3.0).abs() < 1e-4);
        assert!((bounds.min.x - 0.0).abs() < 1e-4);
        assert!((bounds.size().y - 2.0).abs() < 1e-4);
    }
}
