use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::{
    catalog::{AssetCatalog, AssetTypeDescriptor},
    error::AssetError,
    loader::TemplateLoader,
    template::LoadedTemplate,
};

type LoadResult = Result<Arc<LoadedTemplate>, AssetError>;
type InFlight = watch::Receiver<Option<LoadResult>>;

#[derive(Default)]
struct Slots {
    loaded: HashMap<String, Arc<LoadedTemplate>>,
    in_flight: HashMap<String, InFlight>,
    /// Bumped by `clear`; loads started before it do not publish.
    generation: u64,
}

enum Claim {
    Ready(Arc<LoadedTemplate>),
    Wait(InFlight),
    Lead(watch::Sender<Option<LoadResult>>, u64),
}

/// Load-once template cache keyed by asset type.
///
/// The first request for a key runs the load and publishes its outcome on a
/// watch channel. Requests arriving meanwhile wait on that channel and see
/// the same result, error included. A failure is not kept, so the next
/// request after it tries again.
pub struct TemplateCache {
    catalog: Arc<AssetCatalog>,
    loader: Arc<dyn TemplateLoader>,
    slots: Mutex<Slots>,
    timeout: Option<Duration>,
    loads_started: AtomicUsize,
}

impl TemplateCache {
    pub fn new(catalog: Arc<AssetCatalog>, loader: Arc<dyn TemplateLoader>) -> Self {
        Self {
            catalog,
            loader,
            slots: Mutex::new(Slots::default()),
            timeout: None,
            loads_started: AtomicUsize::new(0),
        }
    }

    /// Bounds every load; an expired load fails with [`AssetError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn descriptor(&self, key: &str) -> Result<&AssetTypeDescriptor, AssetError> {
        self.catalog.descriptor(key)
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the template for `key`, loading it on first use.
    ///
    /// Unknown keys fail before any I/O is attempted.
    pub async fn load_asset_type(&self, key: &str) -> LoadResult {
        let descriptor = self.catalog.descriptor(key)?;

        loop {
            match self.claim(key) {
                Claim::Ready(template) => return Ok(template),
                Claim::Lead(sender, generation) => {
                    let result = self.load_template(descriptor).await;
                    {
                        let mut slots = self.slots();
                        if slots.generation == generation {
                            slots.in_flight.remove(key);
                            if let Ok(template) = &result {
                                slots.loaded.insert(key.to_string(), template.clone());
                            }
                        }
                    }
                    sender.send_replace(Some(result.clone()));
                    return result;
                }
                Claim::Wait(mut receiver) => {
                    let outcome = receiver
                        .wait_for(Option::is_some)
                        .await
                        .map(|shared| shared.clone());
                    match outcome {
                        Ok(Some(result)) => return result,
                        _ => {
                            // the leading request was dropped before finishing
                            debug!("Load of '{}' was abandoned, retrying", key);
                            let mut slots = self.slots();
                            if slots
                                .in_flight
                                .get(key)
                                .is_some_and(|current| current.same_channel(&receiver))
                            {
                                slots.in_flight.remove(key);
                            }
                        }
                    }
                }
            }
        }
    }

    fn claim(&self, key: &str) -> Claim {
        let mut slots = self.slots();
        if let Some(template) = slots.loaded.get(key) {
            return Claim::Ready(template.clone());
        }
        if let Some(receiver) = slots.in_flight.get(key) {
            return Claim::Wait(receiver.clone());
        }
        let (sender, receiver) = watch::channel(None);
        slots.in_flight.insert(key.to_string(), receiver);
        Claim::Lead(sender, slots.generation)
    }

    async fn load_template(&self, descriptor: &AssetTypeDescriptor) -> LoadResult {
        self.loads_started.fetch_add(1, Ordering::SeqCst);
        info!("Loading asset type '{}' from {}", descriptor.key, descriptor.load_path);

        let load = self.loader.load(&descriptor.load_path);
        let data = match self.timeout {
            Some(after) => tokio::time::timeout(after, load).await.map_err(|_| {
                AssetError::Timeout {
                    path: descriptor.load_path.clone(),
                    after,
                }
            })??,
            None => load.await?,
        };

        let template = LoadedTemplate::from_scene(descriptor.key.clone(), data)
            .inspect_err(|e| warn!("Rejected template '{}': {}", descriptor.key, e))?;
        debug!(
            "Template '{}' ready: {} nodes, {} roots",
            template.key,
            template.nodes.len(),
            template.roots.len()
        );
        Ok(Arc::new(template))
    }

    /// Already loaded template, without triggering a load.
    pub fn cached(&self, key: &str) -> Option<Arc<LoadedTemplate>> {
        self.slots().loaded.get(key).cloned()
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.cached(key).is_some()
    }

    /// Forgets every template. Loads still in flight still answer their
    /// waiters but are not seen by later requests.
    pub fn clear(&self) {
        let mut slots = self.slots();
        slots.loaded.clear();
        slots.in_flight.clear();
        slots.generation += 1;
    }

    /// Number of loads handed to the loader since creation.
    pub fn loads_started(&self) -> usize {
        self.loads_started.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loader::MemoryLoader,
        scene::{SceneData, SceneNode},
    };
    use glam::Vec3;
    use vitrine_core::{material::MaterialData, mesh::MeshData, transform::Transform};

    fn crate_scene() -> SceneData {
        let mut data = SceneData::default();
        let root = data.add_node(SceneNode::new("crate"));
        data.add_mesh_node(
            Some(root),
            "body",
            MeshData::cuboid(Vec3::splat(0.5)),
            MaterialData::named("wood"),
            Transform::IDENTITY,
        );
        data
    }

    fn catalog() -> Arc<AssetCatalog> {
        Arc::new(
            AssetCatalog::new()
                .with(AssetTypeDescriptor::new("crate", "crate.glb"))
                .unwrap()
                .with(AssetTypeDescriptor::new("ghost", "ghost.glb"))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_load() {
        let loader = Arc::new(MemoryLoader::new().with_latency(Duration::from_millis(20)));
        loader.insert("crate.glb", crate_scene());
        let cache = TemplateCache::new(catalog(), loader.clone());

        let (a, b) = tokio::join!(cache.load_asset_type("crate"), cache.load_asset_type("crate"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.load_count(), 1);

        let c = cache.load_asset_type("crate").await.unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(cache.loads_started(), 1);
    }

    #[tokio::test]
    async fn unknown_key_fails_without_io() {
        let loader = Arc::new(MemoryLoader::new());
        let cache = TemplateCache::new(catalog(), loader.clone());

        let result = cache.load_asset_type("lamp").await;

        assert_eq!(result.unwrap_err(), AssetError::UnknownAssetType("lamp".into()));
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let loader = Arc::new(MemoryLoader::new());
        let cache = TemplateCache::new(catalog(), loader.clone());

        assert!(matches!(
            cache.load_asset_type("ghost").await,
            Err(AssetError::Load { .. })
        ));
        assert!(!cache.is_cached("ghost"));

        loader.insert("ghost.glb", crate_scene());
        assert!(cache.load_asset_type("ghost").await.is_ok());
        assert_eq!(loader.load_count(), 2);
    }

    #[tokio::test]
    async fn waiters_share_a_failed_load() {
        let loader = Arc::new(MemoryLoader::new().with_latency(Duration::from_millis(50)));
        let cache = TemplateCache::new(catalog(), loader.clone());

        let (a, b, c) = tokio::join!(
            cache.load_asset_type("ghost"),
            cache.load_asset_type("ghost"),
            cache.load_asset_type("ghost"),
        );

        for result in [&a, &b, &c] {
            assert!(matches!(result, Err(AssetError::Load { .. })));
        }
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(loader.load_count(), 1);

        // a later request retries
        let _ = cache.load_asset_type("ghost").await;
        assert_eq!(loader.load_count(), 2);
    }

    #[tokio::test]
    async fn waiters_pay_the_timeout_once() {
        let loader = Arc::new(MemoryLoader::new().with_latency(Duration::from_millis(500)));
        loader.insert("crate.glb", crate_scene());
        let cache = TemplateCache::new(catalog(), loader)
            .with_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let results = tokio::join!(
            cache.load_asset_type("crate"),
            cache.load_asset_type("crate"),
            cache.load_asset_type("crate"),
            cache.load_asset_type("crate"),
        );

        assert!(matches!(results.0, Err(AssetError::Timeout { .. })));
        assert!(matches!(results.3, Err(AssetError::Timeout { .. })));
        assert_eq!(cache.loads_started(), 1);
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn abandoned_load_is_taken_over() {
        let loader = Arc::new(MemoryLoader::new().with_latency(Duration::from_millis(20)));
        loader.insert("crate.glb", crate_scene());
        let cache = TemplateCache::new(catalog(), loader);

        let leader = cache.load_asset_type("crate");
        let abandoned =
            tokio::time::timeout(Duration::from_millis(1), leader).await;
        assert!(abandoned.is_err());

        let template = cache.load_asset_type("crate").await.unwrap();
        assert_eq!(template.key, "crate");
        assert_eq!(cache.loads_started(), 2);
    }

    #[tokio::test]
    async fn slow_loads_time_out() {
        let loader = Arc::new(MemoryLoader::new().with_latency(Duration::from_millis(200)));
        loader.insert("crate.glb", crate_scene());
        let cache =
            TemplateCache::new(catalog(), loader).with_timeout(Duration::from_millis(10));

        let result = cache.load_asset_type("crate").await;

        assert!(matches!(result, Err(AssetError::Timeout { .. })));
        assert!(!cache.is_cached("crate"));
    }

    #[tokio::test]
    async fn clear_forces_a_reload() {
        let loader = Arc::new(MemoryLoader::new());
        loader.insert("crate.glb", crate_scene());
        let cache = TemplateCache::new(catalog(), loader.clone());

        let first = cache.load_asset_type("crate").await.unwrap();
        cache.clear();
        let second = cache.load_asset_type("crate").await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(loader.load_count(), 2);
    }
}
