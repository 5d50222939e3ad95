use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;
use vitrine_core::physics::{ColliderKind, PhysicsMaterialDefinition};

use crate::error::AssetError;

fn default_scale() -> f32 {
    1.0
}

fn default_mass() -> f32 {
    1.0
}

/// Static description of one spawnable asset type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetTypeDescriptor {
    #[serde(skip)]
    pub key: String,
    #[serde(rename = "path")]
    pub load_path: String,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_mass")]
    pub mass: f32,
    #[serde(default)]
    pub restitution: Option<f32>,
    #[serde(default)]
    pub friction: Option<f32>,
    #[serde(default, rename = "collider")]
    pub collider_hint: Option<ColliderKind>,
}

impl AssetTypeDescriptor {
    pub fn new(key: impl Into<String>, load_path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            load_path: load_path.into(),
            scale: default_scale(),
            mass: default_mass(),
            restitution: None,
            friction: None,
            collider_hint: None,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = Some(restitution);
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = Some(friction);
        self
    }

    pub fn with_collider(mut self, kind: ColliderKind) -> Self {
        self.collider_hint = Some(kind);
        self
    }

    /// Contact material, 0.5/0.5 where the catalog leaves it unset.
    pub fn physics_material(&self) -> PhysicsMaterialDefinition {
        PhysicsMaterialDefinition {
            friction: self
                .friction
                .unwrap_or(PhysicsMaterialDefinition::DEFAULT_FRICTION),
            restitution: self
                .restitution
                .unwrap_or(PhysicsMaterialDefinition::DEFAULT_RESTITUTION),
        }
    }

    fn validate(&self) -> Result<(), AssetError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(AssetError::Catalog(format!(
                "'{}': scale must be positive, got {}",
                self.key, self.scale
            )));
        }
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(AssetError::Catalog(format!(
                "'{}': mass must be non-negative, got {}",
                self.key, self.mass
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct CatalogDocument {
    assets: BTreeMap<String, AssetTypeDescriptor>,
}

/// Asset-type key -> descriptor lookup, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    assets: BTreeMap<String, AssetTypeDescriptor>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, AssetError> {
        let document: CatalogDocument =
            serde_json::from_str(json).map_err(|e| AssetError::Catalog(e.to_string()))?;

        let mut catalog = AssetCatalog::new();
        for (key, mut descriptor) in document.assets {
            descriptor.key = key;
            catalog.insert(descriptor)?;
        }
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AssetError::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn insert(&mut self, descriptor: AssetTypeDescriptor) -> Result<(), AssetError> {
        descriptor.validate()?;
        self.assets.insert(descriptor.key.clone(), descriptor);
        Ok(())
    }

    pub fn with(mut self, descriptor: AssetTypeDescriptor) -> Result<Self, AssetError> {
        self.insert(descriptor)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&AssetTypeDescriptor> {
        self.assets.get(key)
    }

    pub fn descriptor(&self, key: &str) -> Result<&AssetTypeDescriptor, AssetError> {
        self.get(key)
            .ok_or_else(|| AssetError::UnknownAssetType(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
