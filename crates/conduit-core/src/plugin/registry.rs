//! Registry of plugin factories keyed by category and ID.
//!
//! The registry is filled from two places: the built-in catalog compiled into
//! the binary and manifest files found under the plugins directory. Manifests
//! are only parsed when a descriptor or an instance is requested, so one
//! broken file never prevents the others from loading.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::PluginLoadError;
use crate::types::{AdapterTriple, Category};

use super::descriptor::PluginDescriptor;
use super::options::PluginVars;
use super::{Adapter, PluginInstance, Process, Provider, Sender, builtin, manifest};

/// Builds a plugin instance from its bound variables.
pub type Factory =
    Arc<dyn Fn(&PluginContext<'_>) -> anyhow::Result<PluginInstance> + Send + Sync>;

/// Everything a factory may read while constructing a plugin.
pub struct PluginContext<'a> {
    pub vars: &'a PluginVars,
    pub app: &'a AppContext,
    pub registry: &'a PluginRegistry,
}

#[derive(Clone)]
enum PluginSource {
    Builtin {
        descriptor: PluginDescriptor,
        factory: Factory,
    },
    Manifest {
        path: PathBuf,
    },
}

/// Registry of available plugins.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<(Category, String), PluginSource>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.keys().map(|(c, id)| format!("{}/{}", c, id)))
            .finish()
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in catalog.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (category, descriptor, factory) in builtin::catalog() {
            registry.plugins.insert(
                (category, descriptor.id.clone()),
                PluginSource::Builtin {
                    descriptor,
                    factory,
                },
            );
        }
        registry
    }

    /// Built-in catalog plus manifests found under `plugins_dir`.
    pub fn discover(plugins_dir: &Path) -> Self {
        let mut registry = Self::with_builtins();
        let found = registry.scan_manifests(plugins_dir);
        tracing::debug!("Discovered {} manifest plugin(s) in {}", found, plugins_dir.display());
        registry
    }

    /// Register a plugin implemented in code. Duplicate IDs are rejected.
    pub fn register(
        &mut self,
        category: Category,
        descriptor: PluginDescriptor,
        factory: Factory,
    ) -> Result<(), PluginLoadError> {
        descriptor
            .validate()
            .map_err(|e| PluginLoadError::new(category, &descriptor.id, e))?;
        let key = (category, descriptor.id.clone());
        if self.plugins.contains_key(&key) {
            return Err(PluginLoadError::new(
                category,
                &descriptor.id,
                "a plugin with this ID is already registered",
            ));
        }
        self.plugins.insert(
            key,
            PluginSource::Builtin {
                descriptor,
                factory,
            },
        );
        Ok(())
    }

    /// Register every manifest under `<dir>/adapter` and `<dir>/process`.
    ///
    /// Returns the number of manifests registered. A manifest whose ID is
    /// already taken is skipped with a warning.
    pub fn scan_manifests(&mut self, dir: &Path) -> usize {
        let mut count = 0;
        for category in [Category::Adapter, Category::Process] {
            let root = dir.join(category.dir_name());
            if !root.is_dir() {
                continue;
            }
            let mut files = Vec::new();
            collect_manifests(&root, category == Category::Adapter, &mut files);
            for path in files {
                let Some(id) = manifest_id(&root, &path) else {
                    tracing::warn!("Skipping manifest with unusable name: {}", path.display());
                    continue;
                };
                if category == Category::Adapter && AdapterTriple::from_id(&id).is_none() {
                    tracing::warn!(
                        "Skipping adapter manifest {}: path must be <Product>/<Tool>/<Action>.toml",
                        path.display()
                    );
                    continue;
                }
                let key = (category, id);
                if self.plugins.contains_key(&key) {
                    tracing::warn!(
                        "Skipping manifest {}: {} plugin '{}' is already registered",
                        path.display(),
                        category,
                        key.1
                    );
                    continue;
                }
                self.plugins.insert(key, PluginSource::Manifest { path });
                count += 1;
            }
        }
        count
    }

    pub fn is_known(&self, category: Category, id: &str) -> bool {
        self.plugins.contains_key(&(category, id.to_string()))
    }

    /// Descriptor of a plugin, or `None` when the ID is not registered.
    pub fn descriptor(
        &self,
        category: Category,
        id: &str,
    ) -> Result<Option<PluginDescriptor>, PluginLoadError> {
        match self.plugins.get(&(category, id.to_string())) {
            None => Ok(None),
            Some(PluginSource::Builtin { descriptor, .. }) => Ok(Some(descriptor.clone())),
            Some(PluginSource::Manifest { path }) => manifest::read_descriptor(category, id, path)
                .map(Some)
                .map_err(|e| PluginLoadError::new(category, id, format!("{:#}", e))),
        }
    }

    /// Descriptors of every loadable plugin in `category`, sorted by ID.
    pub fn list(&self, category: Category) -> Vec<PluginDescriptor> {
        self.ids(category)
            .into_iter()
            .filter_map(|id| match self.descriptor(category, &id) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            })
            .collect()
    }

    /// Registered IDs in `category`, including ones whose manifest is broken.
    pub fn ids(&self, category: Category) -> Vec<String> {
        self.plugins
            .keys()
            .filter(|(c, _)| *c == category)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Construct a plugin from its bound variables.
    pub fn load(
        &self,
        category: Category,
        id: &str,
        vars: &PluginVars,
        app: &AppContext,
    ) -> Result<PluginInstance, PluginLoadError> {
        let source = self
            .plugins
            .get(&(category, id.to_string()))
            .ok_or_else(|| PluginLoadError::new(category, id, "no such plugin is registered"))?;
        let ctx = PluginContext {
            vars,
            app,
            registry: self,
        };
        let instance = match source {
            PluginSource::Builtin { factory, .. } => factory(&ctx),
            PluginSource::Manifest { path } => manifest::build(category, id, path, &ctx),
        }
        .map_err(|e| PluginLoadError::new(category, id, format!("{:#}", e)))?;
        tracing::debug!("Loaded {} plugin '{}' as {}", category, id, instance.kind_name());
        Ok(instance)
    }

    pub fn load_process(
        &self,
        id: &str,
        vars: &PluginVars,
        app: &AppContext,
    ) -> Result<Box<dyn Process>, PluginLoadError> {
        let instance = self.load(Category::Process, id, vars, app)?;
        let kind = instance.kind_name();
        instance
            .into_process()
            .ok_or_else(|| mismatch(Category::Process, id, kind))
    }

    pub fn load_sender(
        &self,
        id: &str,
        app: &AppContext,
    ) -> Result<Box<dyn Sender>, PluginLoadError> {
        let instance = self.load(Category::Sender, id, &PluginVars::new(), app)?;
        let kind = instance.kind_name();
        instance
            .into_sender()
            .ok_or_else(|| mismatch(Category::Sender, id, kind))
    }

    pub fn load_adapter(
        &self,
        id: &str,
        vars: &PluginVars,
        app: &AppContext,
    ) -> Result<Box<dyn Adapter>, PluginLoadError> {
        let instance = self.load(Category::Adapter, id, vars, app)?;
        let kind = instance.kind_name();
        instance
            .into_adapter()
            .ok_or_else(|| mismatch(Category::Adapter, id, kind))
    }

    pub fn load_provider(
        &self,
        id: &str,
        vars: &PluginVars,
        app: &AppContext,
    ) -> Result<Box<dyn Provider>, PluginLoadError> {
        let instance = self.load(Category::Provider, id, vars, app)?;
        let kind = instance.kind_name();
        instance
            .into_provider()
            .ok_or_else(|| mismatch(Category::Provider, id, kind))
    }
}

fn mismatch(category: Category, id: &str, kind: &str) -> PluginLoadError {
    PluginLoadError::new(category, id, format!("factory built a {} instead", kind))
}

fn collect_manifests(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read plugin directory {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect_manifests(&path, recursive, out);
            }
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            out.push(path);
        }
    }
}

fn manifest_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    let parts = parts?;
    if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_id_joins_nested_path() {
        let root = Path::new("/plugins/adapter");
        let path = Path::new("/plugins/adapter/Trac/TicketTracker/Ticket_RejectDuplicate.toml");
        assert_eq!(
            manifest_id(root, path).as_deref(),
            Some("Trac/TicketTracker/Ticket_RejectDuplicate")
        );
    }

    #[test]
    fn test_with_builtins_lists_catalog() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.is_known(Category::Provider, "Local"));
        assert!(registry.is_known(Category::Server, "Master"));
        assert!(registry.is_known(Category::Server, "Slave"));
        assert!(registry.is_known(Category::Sender, "ExternalCGIPost"));
        assert!(!registry.is_known(Category::Adapter, "Local"));
    }
}
