//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};

use crate::config::ConfigStore;
use crate::installed::InstalledStore;
use crate::plugin::PluginRegistry;

pub const CONFIG_DIR_ENV: &str = "CONDUIT_CONFIG_DIR";
pub const STATE_DIR_ENV: &str = "CONDUIT_STATE_DIR";
pub const PLUGINS_DIR_ENV: &str = "CONDUIT_PLUGINS_DIR";

/// Paths shared by the installer and the dispatch pipeline.
///
/// Frontends create this once per invocation and hand it down.
#[derive(Debug, Clone)]
pub struct AppContext {
    config_dir: PathBuf,
    state_dir: PathBuf,
    plugins_dir: PathBuf,
}

impl AppContext {
    /// Create a context with explicit paths. Plugins live under
    /// `<config_dir>/plugins`.
    pub fn new(config_dir: PathBuf, state_dir: PathBuf) -> Self {
        let plugins_dir = config_dir.join("plugins");
        Self {
            config_dir,
            state_dir,
            plugins_dir,
        }
    }

    /// Resolve paths from the environment, falling back to platform defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
                .join("conduit"),
        };
        let state_dir = match std::env::var_os(STATE_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
                .join("conduit"),
        };
        let mut context = Self::new(config_dir, state_dir);
        if let Some(dir) = std::env::var_os(PLUGINS_DIR_ENV) {
            context.plugins_dir = PathBuf::from(dir);
        }
        Ok(context)
    }

    /// Same configuration, different installation state.
    pub fn with_state_dir(&self, state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            ..self.clone()
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Get a ConfigStore for `conduit.toml`.
    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.config_dir.join(crate::config::CONFIG_FILE_NAME))
    }

    /// Get the installed components store.
    pub fn installed_store(&self) -> InstalledStore {
        InstalledStore::new(self.state_dir.clone())
    }

    /// Built-in plugins plus manifests under the plugins directory.
    pub fn plugin_registry(&self) -> PluginRegistry {
        PluginRegistry::discover(&self.plugins_dir)
    }
}
