use thiserror::Error;
use vitrine_assets::AssetError;
use vitrine_core::{physics::ShapeError, scene_graph::NodeId};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("invalid collider: {0}")]
    Shape(#[from] ShapeError),

    #[error("invalid spawn input: {0}")]
    InvalidInput(String),
}

/// Why a rotation did not complete.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RotationError {
    #[error("invalid rotation input: {0}")]
    InvalidInput(String),

    #[error("{0} does not exist")]
    MissingNode(NodeId),

    /// Cancelled through `stop_rotation` or because the node went away.
    #[error("rotation stopped")]
    Stopped,

    /// Replaced by a newer rotation on the same node.
    #[error("rotation superseded by a newer one")]
    Superseded,
}

impl RotationError {
    /// Cancellations are expected outcomes, not faults.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RotationError::Stopped | RotationError::Superseded)
    }
}
