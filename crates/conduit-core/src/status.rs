//! Status collection and verification of installed components.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::installed::{InstalledComponentRecord, InstalledStore};
use crate::install::artifacts::digest_file;
use crate::types::{AdapterTriple, Category};

// =============================================================================
// Data Structures
// =============================================================================

/// Overall installation status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub state_dir: PathBuf,
    pub components: Vec<ComponentStatus>,
    pub summary: StatusSummary,
}

/// Summary counts for quick overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub adapters: usize,
    /// Artifacts found modified or missing (only with `--verify`).
    pub issues: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub component: String,
    pub category: Category,
    pub version: String,
    pub provider: String,
    pub installed_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<AdapterTriple>,
    pub artifacts: Vec<ArtifactStatus>,
}

impl ComponentStatus {
    pub fn has_issues(&self) -> bool {
        self.artifacts.iter().any(|a| a.integrity.is_issue())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStatus {
    pub path: PathBuf,
    pub integrity: ArtifactIntegrity,
}

/// Artifact integrity (with --verify)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactIntegrity {
    Ok,
    Modified,
    Missing,
    /// Not verified.
    Unchecked,
}

impl ArtifactIntegrity {
    pub fn is_issue(self) -> bool {
        matches!(self, ArtifactIntegrity::Modified | ArtifactIntegrity::Missing)
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Compare an artifact on disk against its recorded digest.
pub fn verify_artifact(path: &Path, expected: &str) -> ArtifactIntegrity {
    if !path.exists() {
        return ArtifactIntegrity::Missing;
    }
    match digest_file(path) {
        Ok(actual) if actual == expected => ArtifactIntegrity::Ok,
        Ok(_) => ArtifactIntegrity::Modified,
        Err(e) => {
            tracing::warn!("Failed to hash {}: {:#}", path.display(), e);
            ArtifactIntegrity::Modified
        }
    }
}

fn component_status(record: &InstalledComponentRecord, verify: bool) -> ComponentStatus {
    let artifacts = record
        .artifacts
        .iter()
        .map(|(path, digest)| {
            let path = PathBuf::from(path);
            let integrity = if verify {
                verify_artifact(&path, digest)
            } else {
                ArtifactIntegrity::Unchecked
            };
            ArtifactStatus { path, integrity }
        })
        .collect();

    ComponentStatus {
        component: record.component.clone(),
        category: record.category,
        version: record.version.to_string(),
        provider: record.provider.clone(),
        installed_at: record.installed_at,
        adapter: record.adapter.clone(),
        artifacts,
    }
}

/// Collect the status of every installed component.
pub fn collect_status(store: &InstalledStore, verify: bool) -> anyhow::Result<SystemStatus> {
    let registry = store.load()?;
    let components: Vec<ComponentStatus> = registry
        .records()
        .map(|record| component_status(record, verify))
        .collect();

    let summary = StatusSummary {
        total: components.len(),
        adapters: components.iter().filter(|c| c.adapter.is_some()).count(),
        issues: components
            .iter()
            .flat_map(|c| &c.artifacts)
            .filter(|a| a.integrity.is_issue())
            .count(),
    };

    Ok(SystemStatus {
        state_dir: store.state_dir().to_path_buf(),
        components,
        summary,
    })
}
