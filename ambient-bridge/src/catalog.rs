//! Component catalog: Home Assistant presentation metadata per sensor field.
//!
//! Loaded once from the bundled `components.toml` and never mutated.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

const BUNDLED_COMPONENTS: &str = include_str!("../components.toml");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogEntry {
    pub platform: Option<String>,
    pub device_class: Option<String>,
    pub icon: Option<String>,
    pub unit: Option<String>,
    pub name: Option<String>,
}

impl CatalogEntry {
    /// The platform, if the entry is usable for discovery.
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentCatalog {
    #[serde(default)]
    sensors: HashMap<String, CatalogEntry>,
}

impl ComponentCatalog {
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUNDLED_COMPONENTS)
    }

    pub fn from_toml_str(txt: &str) -> Result<Self, ConfigError> {
        toml::from_str(txt).map_err(|source| ConfigError::Parse {
            origin: "components.toml".into(),
            source,
        })
    }

    /// Entry for `key` when it carries a non-empty platform; entries without
    /// one are treated as unknown.
    pub fn lookup(&self, key: &str) -> Option<&CatalogEntry> {
        self.sensors.get(key).filter(|entry| entry.platform().is_some())
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }
}
