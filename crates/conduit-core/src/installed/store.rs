//! Installed registry persistence in the state directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::types::ComponentPath;

use super::types::{InstalledComponentRecord, InstalledRegistry};

pub const INSTALLED_FILE_NAME: &str = "installed.json";

/// Load/modify/save access to `<state_dir>/installed.json`.
///
/// Saves are atomic (tmp file + rename). There is no locking, so two installs
/// running at once can still lose one another's record.
#[derive(Debug, Clone)]
pub struct InstalledStore {
    state_dir: PathBuf,
}

impl InstalledStore {
    pub fn new(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn path(&self) -> PathBuf {
        self.state_dir.join(INSTALLED_FILE_NAME)
    }

    /// Load the registry. Returns an empty registry if the file doesn't exist.
    pub fn load(&self) -> anyhow::Result<InstalledRegistry> {
        let path = self.path();
        if !path.exists() {
            return Ok(InstalledRegistry::new());
        }

        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read installed registry: {}", path.display()))?;
        let registry: InstalledRegistry = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse installed registry: {}", path.display()))?;
        registry.validate()?;
        Ok(registry)
    }

    /// Save the registry atomically (tmp + rename).
    pub fn save(&self, registry: &InstalledRegistry) -> anyhow::Result<()> {
        fs::create_dir_all(&self.state_dir).with_context(|| {
            format!("Failed to create state directory: {}", self.state_dir.display())
        })?;

        let path = self.path();
        let tmp_path = self
            .state_dir
            .join(format!("{}.{}.tmp", INSTALLED_FILE_NAME, std::process::id()));

        let mut registry = registry.clone();
        registry.updated_at = chrono::Utc::now();
        let bytes =
            serde_json::to_vec_pretty(&registry).context("Failed to serialize installed registry")?;

        fs::write(&tmp_path, bytes).with_context(|| {
            format!("Failed to write tmp installed registry: {}", tmp_path.display())
        })?;

        // Remove target first on Windows for replace semantics
        if cfg!(windows) && path.exists() {
            fs::remove_file(&path).with_context(|| {
                format!("Failed to remove existing registry: {}", path.display())
            })?;
        }
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to rename tmp registry: {}", tmp_path.display()))?;

        Ok(())
    }

    pub fn get(&self, path: &ComponentPath) -> anyhow::Result<Option<InstalledComponentRecord>> {
        Ok(self.load()?.get(path).cloned())
    }

    pub fn contains(&self, path: &ComponentPath) -> anyhow::Result<bool> {
        Ok(self.load()?.contains(path))
    }

    /// Add or wholesale replace a record.
    pub fn record(&self, record: InstalledComponentRecord) -> anyhow::Result<()> {
        let mut registry = self.load()?;
        tracing::debug!("Recording installed component {}", record.component);
        registry.upsert(record);
        self.save(&registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginVars;
    use crate::types::Category;
    use tempfile::TempDir;

    fn record(component: &str) -> InstalledComponentRecord {
        let path = ComponentPath::parse(component).unwrap();
        InstalledComponentRecord {
            component: path.key(),
            category: path.category(),
            installed_at: chrono::Utc::now(),
            version: semver::Version::new(1, 0, 0),
            description: String::new(),
            author: String::new(),
            provider: "Local".to_string(),
            parameters: PluginVars::new().with_text("event", "TicketDuplicate"),
            provider_parameters: PluginVars::new(),
            artifacts: Default::default(),
            adapter: None,
        }
    }

    #[test]
    fn test_load_missing_returns_empty() {
        let temp = TempDir::new().unwrap();
        let store = InstalledStore::new(temp.path().join("state"));
        assert!(store.load().unwrap().components.is_empty());
    }

    #[test]
    fn test_record_then_get() {
        let temp = TempDir::new().unwrap();
        let store = InstalledStore::new(temp.path().join("state"));
        store.record(record("Listener/ShellHook")).unwrap();

        let path = ComponentPath::new(Category::Listener, "ShellHook");
        let loaded = store.get(&path).unwrap().expect("record should exist");
        assert_eq!(loaded.parameters.text("event"), Some("TicketDuplicate"));
        assert!(store.contains(&path).unwrap());

        let leftovers: Vec<_> = fs::read_dir(store.state_dir())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = InstalledStore::new(temp.path().to_path_buf());
        fs::write(store.path(), "{ not json").unwrap();
        let err = store.load().unwrap_err().to_string();
        assert!(err.contains("Failed to parse installed registry"));
    }
}
