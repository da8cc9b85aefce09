//! Loading `conduit.toml` and seeding it with a commented sample.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{ConduitConfig, parser};

const SAMPLE_CONFIG: &str = r#"# Slave clients the master delivers actions to.
#
# [[slave]]
# name = "local"
# type = "Local"
# tools = ["*"]
#
# [[slave]]
# name = "remote"
# type = "ExternalCGIPost"
# tools = ["TicketTracker"]
#
# [slave.params]
# url = "https://slave.example.org/cgi-bin/conduit-slave.cgi"
# timeout_secs = 30
"#;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Load the configuration; a missing file is an empty configuration.
    pub fn load(&self) -> anyhow::Result<ConduitConfig> {
        if !self.config_path.exists() {
            return Ok(ConduitConfig::new());
        }
        parser::parse_conduit_toml(&self.config_path)
    }

    /// Write a commented sample unless a configuration already exists.
    ///
    /// Returns whether a file was written.
    pub fn write_sample_if_missing(&self) -> anyhow::Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        self.write(SAMPLE_CONFIG)?;
        Ok(true)
    }

    fn write(&self, content: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
