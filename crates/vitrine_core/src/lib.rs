pub use glam;

pub mod bounds;
pub mod material;
pub mod mesh;
pub mod physics;
pub mod scene_graph;
pub mod time;
pub mod transform;

pub use bounds::Aabb;
pub use scene_graph::{Node, NodeContent, NodeId, Scene, SpotLight, UserData};
pub use transform::Transform;
