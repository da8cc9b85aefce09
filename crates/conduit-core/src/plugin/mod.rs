//! Plugin contracts, descriptors and the registry that builds them.
//!
//! Every plugin is a value built by a factory from its bound variables. The
//! category decides which trait the built value implements:
//!
//! - [`Process`] turns an event into [`SlaveActions`] on the master side.
//! - [`Sender`] moves actions to one slave.
//! - [`Adapter`] applies one action on the slave side.
//! - [`Provider`] supplies the [`ProviderEnvironment`] installers run against.
//! - Servers and listeners only need [`Installable`].

pub mod builtin;
pub mod descriptor;
pub mod manifest;
pub mod options;
pub mod registry;

use std::fmt;

use crate::actions::SlaveActions;
use crate::config::ConnectionParams;
use crate::error::ConduitError;
use crate::install::{InstallContext, InstallOutput};
use crate::provider::ProviderEnvironment;

pub use descriptor::{PluginDescriptor, VarKind, VarOption};
pub use options::{ComposedOptions, OptionComposer, ParsedOptions, PluginVars, VarValue};
pub use registry::{Factory, PluginContext, PluginRegistry};

/// Two-phase installation protocol.
pub trait Installable {
    /// Verify preconditions without side effects.
    fn check(&self, _ctx: &InstallContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Perform the installation. Not rolled back on failure.
    fn execute(&self, _ctx: &InstallContext<'_>) -> anyhow::Result<InstallOutput> {
        Ok(InstallOutput::default())
    }
}

pub trait Process {
    /// Produce the actions for one event occurrence. `args` are the positional
    /// arguments left after the process options were parsed.
    fn run(&self, args: &[String]) -> anyhow::Result<SlaveActions>;
}

pub trait Sender {
    fn send(
        &self,
        user: &str,
        actions: &SlaveActions,
        params: &ConnectionParams,
    ) -> Result<(), ConduitError>;
}

pub trait Adapter: Installable {
    fn apply(&self, user: &str, params: &[String]) -> anyhow::Result<()>;
}

pub trait Provider: Installable {
    fn environment(&self) -> anyhow::Result<ProviderEnvironment>;
}

/// A constructed plugin.
pub enum PluginInstance {
    Process(Box<dyn Process>),
    Sender(Box<dyn Sender>),
    Adapter(Box<dyn Adapter>),
    Provider(Box<dyn Provider>),
    /// Servers and listeners.
    Component(Box<dyn Installable>),
}

impl PluginInstance {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PluginInstance::Process(_) => "process",
            PluginInstance::Sender(_) => "sender",
            PluginInstance::Adapter(_) => "adapter",
            PluginInstance::Provider(_) => "provider",
            PluginInstance::Component(_) => "component",
        }
    }

    pub fn is_installable(&self) -> bool {
        !matches!(self, PluginInstance::Process(_) | PluginInstance::Sender(_))
    }

    pub fn check(&self, ctx: &InstallContext<'_>) -> anyhow::Result<()> {
        match self {
            PluginInstance::Adapter(a) => a.check(ctx),
            PluginInstance::Provider(p) => p.check(ctx),
            PluginInstance::Component(c) => c.check(ctx),
            other => anyhow::bail!("a {} cannot be installed", other.kind_name()),
        }
    }

    pub fn execute(&self, ctx: &InstallContext<'_>) -> anyhow::Result<InstallOutput> {
        match self {
            PluginInstance::Adapter(a) => a.execute(ctx),
            PluginInstance::Provider(p) => p.execute(ctx),
            PluginInstance::Component(c) => c.execute(ctx),
            other => anyhow::bail!("a {} cannot be installed", other.kind_name()),
        }
    }

    pub fn into_process(self) -> Option<Box<dyn Process>> {
        match self {
            PluginInstance::Process(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_sender(self) -> Option<Box<dyn Sender>> {
        match self {
            PluginInstance::Sender(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_adapter(self) -> Option<Box<dyn Adapter>> {
        match self {
            PluginInstance::Adapter(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_provider(self) -> Option<Box<dyn Provider>> {
        match self {
            PluginInstance::Provider(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginInstance::{}", self.kind_name())
    }
}
