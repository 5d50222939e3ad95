pub mod capabilities;
pub mod error;
pub mod rotator;
pub mod spawner;

pub use capabilities::{DisplayPanel, DisplaySwitch, Flip, Rotate};
pub use error::{RotationError, SpawnError};
pub use rotator::{AssetRotator, Easing, HalfwayCallback, RotationOptions, RotationTask};
pub use spawner::{AssetSpawner, PhysicsMode, SpawnOptions, SpawnedAsset};
