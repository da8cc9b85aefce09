//! Conduit Core Library
//!
//! Plugin-driven dispatch between collaboration tools: a master turns an
//! observed event into per-tool actions and delivers them to slaves, which
//! apply them through installed adapters. Also provides the installer that
//! activates servers, adapters, listeners and providers.

pub mod actions;
pub mod config;
pub mod context;
pub mod error;
pub mod install;
pub mod installed;
pub mod master;
pub mod plugin;
pub mod provider;
pub mod slave;
pub mod status;
pub mod transport;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    pub use crate::actions::SlaveActions;
    pub use crate::config::{ConduitConfig, ConnectionParams, RegisteredSlaveClient};
    pub use crate::context::AppContext;
    pub use crate::error::{ConduitError, PluginLoadError, WireError};

    // Installation
    pub use crate::install::{InstallReport, InstallRequest, Installer};
    pub use crate::installed::{InstalledComponentRecord, InstalledStore};
    pub use crate::provider::ProviderEnvironment;

    // Dispatch
    pub use crate::master::{DispatchReport, MasterDispatch};
    pub use crate::slave::{SlaveDispatch, SlaveReport};

    // Plugins
    pub use crate::plugin::{
        Adapter, Installable, PluginDescriptor, PluginInstance, PluginRegistry, PluginVars,
        Process, Provider, Sender, VarOption,
    };
    pub use crate::types::{AdapterTriple, Category, ComponentPath};
}
