use std::{
    collections::HashMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{error::AssetError, scene::SceneData};

/// Source of raw scene data. Implementations must be usable from many tasks
/// at once; the cache guarantees at most one in-flight load per asset type.
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    async fn load(&self, path: &str) -> Result<SceneData, AssetError>;
}

/// In-memory loader for procedural content and tests.
#[derive(Default)]
pub struct MemoryLoader {
    scenes: Mutex<HashMap<String, SceneData>>,
    latency: Option<Duration>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every load, which makes overlapping requests observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, path: impl Into<String>, scene: SceneData) {
        self.scenes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), scene);
    }

    pub fn remove(&self, path: &str) -> Option<SceneData> {
        self.scenes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
    }

    /// Number of `load` calls that reached this loader.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateLoader for MemoryLoader {
    async fn load(&self, path: &str) -> Result<SceneData, AssetError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.scenes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::load(path, "no such scene"))
    }
}
