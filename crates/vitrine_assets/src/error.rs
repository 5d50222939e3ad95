use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssetError {
    /// No catalog entry for the requested key. Raised before any I/O.
    #[error("no asset type registered under '{0}'")]
    UnknownAssetType(String),

    #[error("failed to load '{path}': {reason}")]
    Load { path: String, reason: String },

    #[error("loading '{path}' timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    #[error("invalid asset catalog: {0}")]
    Catalog(String),
}

impl AssetError {
    pub fn load(path: impl Into<String>, reason: impl ToString) -> Self {
        AssetError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the failures a caller may retry (I/O, timeouts).
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssetError::Load { .. } | AssetError::Timeout { .. })
    }
}
