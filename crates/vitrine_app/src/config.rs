use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed showroom config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid showroom config: {0}")]
    Invalid(String),
}

/// Host-level settings. Every field has a default, so `{}` is a valid
/// document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShowroomConfig {
    pub gravity: [f32; 3],
    /// Physics step in seconds; `None` leaves stepping to the host.
    pub fixed_timestep: Option<f32>,
    pub load_timeout_ms: Option<u64>,
    pub debug_visualization: bool,
    /// Yield to the runtime once before inserting a freshly loaded instance.
    pub yield_before_insert: bool,
    /// Directory file-backed loaders resolve asset paths against.
    pub asset_root: PathBuf,
}

impl Default for ShowroomConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            fixed_timestep: Some(1.0 / 60.0),
            load_timeout_ms: Some(30_000),
            debug_visualization: false,
            yield_before_insert: true,
            asset_root: PathBuf::from("assets"),
        }
    }
}

impl ShowroomConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ShowroomConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity().is_finite() {
            return Err(ConfigError::Invalid(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }
        if let Some(step) = self.fixed_timestep {
            if !step.is_finite() || step <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "fixed_timestep must be positive, got {}",
                    step
                )));
            }
        }
        if self.load_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "load_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}
