use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, error};

use crate::{error::AssetError, loader::TemplateLoader, scene::SceneData};

pub mod gltf_parser;
pub mod obj_parser;

/// Loads `.gltf`/`.glb`/`.obj` files relative to a root directory. Parsing is
/// blocking and runs on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl TemplateLoader for FileLoader {
    async fn load(&self, path: &str) -> Result<SceneData, AssetError> {
        let full_path = self.resolve(path);
        let extension = full_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let parse: fn(&str) -> Result<SceneData, String> = match extension.as_str() {
            "gltf" | "glb" => gltf_parser::parse_gltf,
            "obj" => obj_parser::parse_obj,
            other => {
                return Err(AssetError::load(
                    path,
                    format!("unsupported file extension '{}'", other),
                ));
            }
        };

        debug!("[AssetServer] Loading: {}", full_path.display());
        let path_str = full_path.to_string_lossy().into_owned();
        let load_result = tokio::task::spawn_blocking(move || parse(&path_str)).await;

        match load_result {
            Ok(Ok(scene)) => Ok(scene),
            Ok(Err(e)) => {
                error!("[AssetServer] Parse error in {}: {}", path, e);
                Err(AssetError::load(path, e))
            }
            Err(e) => Err(AssetError::load(path, format!("loader task failed: {}", e))),
        }
    }
}
