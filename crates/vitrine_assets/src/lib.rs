pub mod asset_server;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod loader;
pub mod scene;
pub mod storage;
pub mod template;

pub use asset_server::FileLoader;
pub use cache::TemplateCache;
pub use catalog::{AssetCatalog, AssetTypeDescriptor};
pub use error::AssetError;
pub use loader::{MemoryLoader, TemplateLoader};
pub use scene::{SceneData, SceneNode};
pub use storage::{AssetStorage, InstanceId, InstancePair, InstanceRecord};
pub use template::{LoadedTemplate, SubmeshRole, TemplateNode};
