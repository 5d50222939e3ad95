//! The showroom: one explicitly constructed context owning the scene, the
//! physics world and every manager, driven by the host's frame loop.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use glam::{Quat, Vec3};
use log::{error, info};
use thiserror::Error;
use vitrine_assets::{
    AssetCatalog, AssetError, AssetStorage, FileLoader, InstanceId, InstanceRecord,
    TemplateCache, TemplateLoader,
};
use vitrine_core::{
    scene_graph::{NodeId, Scene},
    time::PhysicsTime,
};
use vitrine_debug::DebugVisualizationManager;
use vitrine_physics::{PhysicsWorld, SyncReport, sync_bodies};
use vitrine_scene::{
    AssetRotator, AssetSpawner, RotationError, RotationOptions, RotationTask, SpawnError,
    SpawnOptions, SpawnedAsset,
};

pub mod config;

pub use config::{ConfigError, ShowroomConfig};

/// Failure to build a showroom from files.
#[derive(Debug, Error)]
pub enum ShowroomError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything the frame loop mutates. Only ever touched under the showroom
/// lock, and never across an await.
pub struct Stage {
    pub scene: Scene,
    pub physics: PhysicsWorld,
    pub storage: AssetStorage,
    pub spawner: AssetSpawner,
    pub rotator: AssetRotator,
    pub debug: DebugVisualizationManager,
    physics_time: Option<PhysicsTime>,
}

pub struct Showroom {
    templates: Arc<TemplateCache>,
    stage: Mutex<Stage>,
    config: ShowroomConfig,
}

impl Showroom {
    /// Builds the showroom; fails when `config` does not validate.
    pub fn new(
        catalog: AssetCatalog,
        loader: Arc<dyn TemplateLoader>,
        config: ShowroomConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut cache = TemplateCache::new(Arc::new(catalog), loader);
        if let Some(timeout) = config.load_timeout() {
            cache = cache.with_timeout(timeout);
        }
        let templates = Arc::new(cache);

        let mut stage = Stage {
            scene: Scene::new(),
            physics: PhysicsWorld::with_gravity(config.gravity()),
            storage: AssetStorage::new(templates.clone()),
            spawner: AssetSpawner::new(),
            rotator: AssetRotator::new(),
            debug: DebugVisualizationManager::new(),
            physics_time: config.fixed_timestep.map(PhysicsTime::new),
        };
        if config.debug_visualization {
            let Stage {
                scene,
                physics,
                storage,
                debug,
                ..
            } = &mut stage;
            debug.set_enabled(true, scene, physics, storage);
        }

        Ok(Self {
            templates,
            stage: Mutex::new(stage),
            config,
        })
    }

    /// Showroom over files: catalog document plus a loader rooted at
    /// `config.asset_root`.
    pub fn from_files(
        catalog_path: impl AsRef<Path>,
        config: ShowroomConfig,
    ) -> Result<Self, ShowroomError> {
        let catalog = AssetCatalog::from_path(catalog_path)?;
        let loader = Arc::new(FileLoader::new(config.asset_root.clone()));
        Self::new(catalog, loader, config).map_err(ShowroomError::from)
    }

    pub fn config(&self) -> &ShowroomConfig {
        &self.config
    }

    pub fn templates(&self) -> &Arc<TemplateCache> {
        &self.templates
    }

    fn stage(&self) -> MutexGuard<'_, Stage> {
        self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the scene, physics and managers.
    pub fn with_stage<R>(&self, f: impl FnOnce(&mut Stage) -> R) -> R {
        f(&mut self.stage())
    }

    /// Loads (or reuses) the template, then instantiates it. Concurrent calls
    /// for the same type share one load.
    pub async fn try_spawn(
        &self,
        key: &str,
        position: Vec3,
        rotation: Quat,
        options: SpawnOptions,
    ) -> Result<SpawnedAsset, SpawnError> {
        let template = self.templates.load_asset_type(key).await?;

        if self.config.yield_before_insert {
            tokio::task::yield_now().await;
        }

        let mut stage = self.stage();
        let Stage {
            scene,
            physics,
            storage,
            spawner,
            debug,
            ..
        } = &mut *stage;
        let spawned =
            spawner.instantiate(scene, physics, storage, &template, position, rotation, &options)?;

        if debug.is_enabled()
            && let Some(record) = storage.get_instance(spawned.instance_id)
        {
            debug.add_instance_wireframes(scene, physics, record);
        }
        Ok(spawned)
    }

    /// Like [`Showroom::try_spawn`], but a failure is logged and reported as
    /// `None`.
    pub async fn spawn(
        &self,
        key: &str,
        position: Vec3,
        rotation: Quat,
        options: SpawnOptions,
    ) -> Option<SpawnedAsset> {
        match self.try_spawn(key, position, rotation, options).await {
            Ok(spawned) => Some(spawned),
            Err(e) => {
                error!("Failed to spawn '{}': {}", key, e);
                None
            }
        }
    }

    pub fn get_instance(&self, id: InstanceId) -> Option<InstanceRecord> {
        self.stage().storage.get_instance(id).cloned()
    }

    /// One frame: fixed physics steps (when configured), body sync,
    /// rotations, debug visuals.
    pub fn tick(&self, dt: Duration) -> SyncReport {
        let mut stage = self.stage();
        let Stage {
            scene,
            physics,
            storage,
            rotator,
            debug,
            physics_time,
            ..
        } = &mut *stage;

        if let Some(time) = physics_time {
            for _ in 0..time.steps_for(dt) {
                physics.step(time.fixed_dt);
            }
        }

        let report = sync_bodies(storage.dynamic_pairs(), scene, physics);
        rotator.update(scene, dt);
        debug.update(scene, physics);
        report
    }

    pub fn set_debug_visualization_enabled(&self, enabled: bool) {
        let mut stage = self.stage();
        let Stage {
            scene,
            physics,
            storage,
            debug,
            ..
        } = &mut *stage;
        debug.set_enabled(enabled, scene, physics, storage);
    }

    pub fn rotate(
        &self,
        node: NodeId,
        axis: Vec3,
        radians: f32,
        duration: Duration,
        options: RotationOptions,
    ) -> Result<RotationTask, RotationError> {
        let mut stage = self.stage();
        let Stage { scene, rotator, .. } = &mut *stage;
        rotator.rotate_asset(scene, node, axis, radians, duration, options)
    }

    pub fn stop_rotation(&self, node: NodeId) -> bool {
        self.stage().rotator.stop_rotation(node)
    }

    /// Removes one instance with its body and colliders.
    pub fn dispose_instance(&self, id: InstanceId) -> bool {
        let mut stage = self.stage();
        let Stage {
            scene,
            physics,
            storage,
            spawner,
            debug,
            ..
        } = &mut *stage;

        let Some(record) = storage.get_instance(id).cloned() else {
            return false;
        };
        // wireframes owned by the instance's body go too
        let owned: Vec<_> = debug
            .wireframes()
            .filter(|w| match w.owner {
                vitrine_debug::WireframeOwner::Body(body) => Some(body) == record.physics_body,
                vitrine_debug::WireframeOwner::Object(node) => node == record.visual_node,
            })
            .map(|w| w.uuid)
            .collect();
        for uuid in owned {
            debug.remove_wireframe(scene, uuid);
        }

        spawner.forget(id);
        storage.dispose_instance(id, scene, physics)
    }

    /// Full teardown: instances, caches, rotations, debug visuals.
    pub fn cleanup(&self) {
        let mut stage = self.stage();
        let Stage {
            scene,
            physics,
            storage,
            spawner,
            rotator,
            debug,
            physics_time,
        } = &mut *stage;

        rotator.stop_all();
        debug.clear(scene);
        spawner.clear();
        storage.cleanup(scene, physics);
        if let Some(time) = physics_time {
            time.accumulator = 0.0;
        }
        info!("Showroom cleaned up");
    }
}
