//! Error taxonomy for installation and dispatch.
//!
//! Plugin implementations return `anyhow::Result` with context attached; the
//! framework wraps those failures into the class that matches where they
//! happened so frontends can report them and pick an exit code.

use std::fmt;

use thiserror::Error;

use crate::master::DispatchReport;
use crate::slave::SlaveReport;
use crate::types::Category;

pub type Result<T, E = ConduitError> = std::result::Result<T, E>;

/// Errors surfaced by the installer, the dispatch pipeline and the transports.
#[derive(Debug, Error)]
pub enum ConduitError {
    /// Bad or missing command-line input. `usage` carries the help text of the
    /// parser that rejected it, when one exists.
    #[error("{message}")]
    CommandLine {
        message: String,
        usage: Option<String>,
    },

    #[error("unknown component '{path}'")]
    UnknownComponent { path: String },

    #[error("no process is registered for event '{event}'")]
    UnknownProcess { event: String },

    #[error("component '{path}' is already installed (since {installed_at}); use --force to reinstall")]
    AlreadyInstalled { path: String, installed_at: String },

    #[error("component '{path}' requires '{server}' to be installed first")]
    MissingServer { path: String, server: String },

    #[error("provider '{provider}': {message}")]
    Provider { provider: String, message: String },

    #[error(transparent)]
    PluginLoad(#[from] PluginLoadError),

    #[error("check failed for '{path}': {source:#}")]
    CheckFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// `execute` failed partway. Whatever it changed before failing stays.
    #[error("installation of '{path}' failed: {source:#} (changes made before the failure were not rolled back)")]
    InstallFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("process '{event}' failed: {source:#}")]
    ProcessFailed {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("transport to '{target}' failed: {message}")]
    Transport { target: String, message: String },

    /// The transport succeeded but the slave did not report success.
    #[error("slave at '{target}' reported failure:\n{body}")]
    RemoteFailure { target: String, body: String },

    #[error("{} of {} action(s) failed:\n{}", .failures.len(), .report.attempted, lines(.failures))]
    ActionsFailed {
        failures: Vec<ActionFailure>,
        report: SlaveReport,
    },

    #[error("delivery failed for {} slave client(s):\n{}", .failures.len(), lines(.failures))]
    ClientsFailed {
        failures: Vec<ClientFailure>,
        report: DispatchReport,
    },

    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error("installed registry error: {0:#}")]
    Registry(anyhow::Error),

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl ConduitError {
    pub fn command_line(message: impl Into<String>) -> Self {
        ConduitError::CommandLine {
            message: message.into(),
            usage: None,
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConduitError::CommandLine { .. } => 2,
            ConduitError::UnknownComponent { .. } | ConduitError::UnknownProcess { .. } => 3,
            ConduitError::AlreadyInstalled { .. } => 4,
            ConduitError::MissingServer { .. } => 5,
            ConduitError::Provider { .. } => 6,
            ConduitError::PluginLoad(_) => 7,
            ConduitError::CheckFailed { .. } => 8,
            ConduitError::InstallFailed { .. } => 9,
            ConduitError::ProcessFailed { .. } => 10,
            ConduitError::Transport { .. }
            | ConduitError::RemoteFailure { .. }
            | ConduitError::ClientsFailed { .. } => 11,
            ConduitError::ActionsFailed { .. } => 12,
            ConduitError::Config(_) => 13,
            ConduitError::Registry(_) => 14,
            ConduitError::Wire(_) => 15,
        }
    }
}

/// A plugin whose implementation exists but could not be loaded or built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load {category} plugin '{id}': {reason}")]
pub struct PluginLoadError {
    pub category: Category,
    pub id: String,
    pub reason: String,
}

impl PluginLoadError {
    pub fn new(category: Category, id: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            category,
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures decoding a transport payload.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported payload version {found} (this build reads version {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("request is missing the '{0}' field")]
    MissingField(&'static str),

    #[error("malformed request: {0}")]
    Malformed(String),
}

/// One action occurrence that failed on the slave side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub product: String,
    pub tool: String,
    pub action: String,
    pub params: Vec<String>,
    pub message: String,
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} [{}]: {}",
            self.product,
            self.tool,
            self.action,
            self.params.join(", "),
            self.message
        )
    }
}

/// One slave client the master could not deliver to.
#[derive(Debug)]
pub struct ClientFailure {
    pub client: String,
    pub error: Box<ConduitError>,
}

impl fmt::Display for ClientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.client, self.error)
    }
}

fn lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("  - {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
