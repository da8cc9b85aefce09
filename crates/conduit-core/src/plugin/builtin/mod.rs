//! Plugins compiled into conduit.

mod listener;
mod process;
mod provider;
mod server;

use std::sync::Arc;

use crate::plugin::descriptor::{PluginDescriptor, VarOption};
use crate::plugin::{Factory, PluginContext, PluginInstance};
use crate::transport::{cgi_post::ExternalCgiPost, local::LocalSender};
use crate::types::{Category, MASTER_SERVER, SLAVE_SERVER};

pub use listener::ShellHook;
pub use process::CloseDuplicate;
pub use provider::LocalProvider;
pub use server::{MasterServer, SlaveServer};

pub const LOCAL_PROVIDER: &str = "Local";
pub const SHELL_HOOK_LISTENER: &str = "ShellHook";
pub const CLOSE_DUPLICATE_PROCESS: &str = "Ticket_CloseDuplicate";
pub const LOCAL_SENDER: &str = "Local";
pub const CGI_POST_SENDER: &str = "ExternalCGIPost";

const AUTHOR: &str = "conduit contributors";

fn version() -> semver::Version {
    semver::Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| semver::Version::new(0, 0, 0))
}

fn descriptor(id: &str, description: &str) -> PluginDescriptor {
    PluginDescriptor::new(id, version())
        .with_description(description)
        .with_author(AUTHOR)
}

/// Wrap a closure as a [`Factory`].
pub fn factory<F>(f: F) -> Factory
where
    F: Fn(&PluginContext<'_>) -> anyhow::Result<PluginInstance> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Every built-in plugin with its descriptor and factory.
pub fn catalog() -> Vec<(Category, PluginDescriptor, Factory)> {
    vec![
        (
            Category::Provider,
            descriptor(LOCAL_PROVIDER, "Directories and commands of the local host")
                .with_option(VarOption::value(
                    "persistent_dir",
                    "Directory for installation state (default: the conduit state directory)",
                ))
                .with_option(VarOption::value("shell_dir", "Directory for generated shell scripts"))
                .with_option(VarOption::value("cgi_url", "Public URL of the CGI directory"))
                .with_option(VarOption::value("cgi_dir", "Filesystem path of the CGI directory"))
                .with_option(VarOption::value(
                    "execute_command",
                    "conduit executable generated scripts run (default: next to this program)",
                )),
            factory(|ctx| {
                Ok(PluginInstance::Provider(Box::new(LocalProvider::from_vars(
                    ctx.vars, ctx.app,
                ))))
            }),
        ),
        (
            Category::Server,
            descriptor(MASTER_SERVER, "Dispatch entry point for events observed on this host"),
            factory(|_| Ok(PluginInstance::Component(Box::new(MasterServer)))),
        ),
        (
            Category::Server,
            descriptor(SLAVE_SERVER, "Receiving endpoint that applies dispatched actions"),
            factory(|_| Ok(PluginInstance::Component(Box::new(SlaveServer)))),
        ),
        (
            Category::Listener,
            descriptor(SHELL_HOOK_LISTENER, "Shell script an originating tool runs on an event")
                .with_option(
                    VarOption::value("event", "Event the hook dispatches")
                        .with_short('E')
                        .mandatory(),
                ),
            factory(|ctx| {
                Ok(PluginInstance::Component(Box::new(ShellHook::from_vars(
                    ctx.vars,
                )?)))
            }),
        ),
        (
            Category::Process,
            descriptor(
                CLOSE_DUPLICATE_PROCESS,
                "Close a ticket on the slave as a duplicate of a master ticket",
            )
            .with_option(VarOption::value("master_ticket", "Ticket number on the master").mandatory())
            .with_option(VarOption::value("slave_ticket", "Ticket number on the slave").mandatory()),
            factory(|ctx| {
                Ok(PluginInstance::Process(Box::new(CloseDuplicate::from_vars(
                    ctx.vars,
                )?)))
            }),
        ),
        (
            Category::Sender,
            descriptor(LOCAL_SENDER, "Apply actions in-process against a slave on this host"),
            factory(|ctx| {
                Ok(PluginInstance::Sender(Box::new(LocalSender::new(
                    ctx.registry.clone(),
                    ctx.app.clone(),
                ))))
            }),
        ),
        (
            Category::Sender,
            descriptor(CGI_POST_SENDER, "POST actions to a remote slave CGI endpoint"),
            factory(|_| Ok(PluginInstance::Sender(Box::new(ExternalCgiPost)))),
        ),
    ]
}
