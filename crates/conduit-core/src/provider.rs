//! Environment capabilities supplied by a provider plugin.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use serde::Serialize;
use url::Url;

/// Web-served CGI directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CgiCapability {
    /// Public URL under which `internal_dir` is served.
    pub url: Url,
    pub internal_dir: PathBuf,
}

/// Directory for shell entry scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellCapability {
    pub internal_dir: PathBuf,
}

/// What the host can offer to an installer. A capability is absent when the
/// provider does not support it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderEnvironment {
    pub cgi: Option<CgiCapability>,
    pub shell: Option<ShellCapability>,
    pub persistent_dir: Option<PathBuf>,
    pub execute_command: Option<PathBuf>,
}

impl ProviderEnvironment {
    pub fn require_cgi(&self) -> anyhow::Result<&CgiCapability> {
        self.cgi
            .as_ref()
            .ok_or_else(|| anyhow!("the provider offers no CGI capability"))
    }

    pub fn require_shell(&self) -> anyhow::Result<&ShellCapability> {
        self.shell
            .as_ref()
            .ok_or_else(|| anyhow!("the provider offers no shell capability"))
    }

    pub fn require_persistent_dir(&self) -> anyhow::Result<&Path> {
        self.persistent_dir
            .as_deref()
            .ok_or_else(|| anyhow!("the provider offers no persistent directory"))
    }

    pub fn require_execute_command(&self) -> anyhow::Result<&Path> {
        self.execute_command
            .as_deref()
            .ok_or_else(|| anyhow!("the provider offers no execute command"))
    }

    /// Names of the capabilities present, for logs and listings.
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut caps = Vec::new();
        if self.cgi.is_some() {
            caps.push("cgi");
        }
        if self.shell.is_some() {
            caps.push("shell");
        }
        if self.persistent_dir.is_some() {
            caps.push("persistent_dir");
        }
        if self.execute_command.is_some() {
            caps.push("execute_command");
        }
        caps
    }
}
