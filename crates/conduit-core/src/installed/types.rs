//! Installed component records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::plugin::PluginVars;
use crate::types::{AdapterTriple, Category, ComponentPath};

pub const REGISTRY_VERSION: u32 = 1;

/// Persisted set of installed components keyed by component path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledRegistry {
    /// Registry format version
    pub version: u32,

    /// Timestamp of the last save
    pub updated_at: chrono::DateTime<chrono::Utc>,

    #[serde(default)]
    pub components: BTreeMap<String, InstalledComponentRecord>,
}

/// One installed component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledComponentRecord {
    /// Component path, `<Category>/<ID>`.
    pub component: String,
    pub category: Category,
    pub installed_at: chrono::DateTime<chrono::Utc>,
    pub version: semver::Version,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Provider the component was installed against.
    pub provider: String,
    /// Variables bound to the component at install time. Adapters are rebuilt
    /// from these on the slave side.
    #[serde(default)]
    pub parameters: PluginVars,
    #[serde(default)]
    pub provider_parameters: PluginVars,
    /// Generated files and their blake3 digests.
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<AdapterTriple>,
}

impl InstalledComponentRecord {
    pub fn path(&self) -> ComponentPath {
        ComponentPath::new(self.category, plugin_id(&self.component))
    }

    pub fn id(&self) -> &str {
        plugin_id(&self.component)
    }
}

fn plugin_id(component: &str) -> &str {
    component
        .split_once('/')
        .map(|(_, id)| id)
        .unwrap_or(component)
}

impl Default for InstalledRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InstalledRegistry {
    pub fn new() -> Self {
        Self {
            version: REGISTRY_VERSION,
            updated_at: chrono::Utc::now(),
            components: BTreeMap::new(),
        }
    }

    pub fn get(&self, path: &ComponentPath) -> Option<&InstalledComponentRecord> {
        self.components.get(&path.key())
    }

    pub fn contains(&self, path: &ComponentPath) -> bool {
        self.components.contains_key(&path.key())
    }

    /// Insert or wholesale replace the record for its component.
    pub fn upsert(&mut self, record: InstalledComponentRecord) {
        self.components.insert(record.component.clone(), record);
    }

    /// Installed adapters for `(tool, action)` across all products.
    pub fn adapters_for(&self, tool: &str, action: &str) -> Vec<&InstalledComponentRecord> {
        self.components
            .values()
            .filter(|record| {
                record
                    .adapter
                    .as_ref()
                    .is_some_and(|t| t.tool == tool && t.action == action)
            })
            .collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &InstalledComponentRecord> {
        self.components.values()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version != REGISTRY_VERSION {
            anyhow::bail!("Unsupported installed registry version: {}", self.version);
        }
        for (key, record) in &self.components {
            if key != &record.component {
                anyhow::bail!(
                    "Installed registry entry '{}' holds a record for '{}'",
                    key,
                    record.component
                );
            }
        }
        Ok(())
    }
}
