use anyhow::{Context, bail};

use crate::install::artifacts::{exec_line, render_script, write_script};
use crate::install::{InstallContext, InstallOutput};
use crate::plugin::Installable;
use crate::types::Category;

pub const DISPATCH_SCRIPT: &str = "conduit-dispatch";
pub const SLAVE_CGI_SCRIPT: &str = "conduit-slave.cgi";
pub const RECEIVE_SCRIPT: &str = "conduit-receive";

fn prepare_persistent_dir(ctx: &InstallContext<'_>) -> anyhow::Result<()> {
    let dir = ctx.environment.require_persistent_dir()?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create persistent directory: {}", dir.display()))
}

/// Master side: the `conduit dispatch` entry point and its configuration.
#[derive(Debug, Clone, Copy)]
pub struct MasterServer;

impl Installable for MasterServer {
    fn check(&self, ctx: &InstallContext<'_>) -> anyhow::Result<()> {
        ctx.environment.require_persistent_dir()?;
        ctx.environment.require_execute_command()?;
        ctx.app
            .config_store()
            .load()
            .context("existing master configuration is invalid")?;
        Ok(())
    }

    fn execute(&self, ctx: &InstallContext<'_>) -> anyhow::Result<InstallOutput> {
        let mut output = InstallOutput::default();
        prepare_persistent_dir(ctx)?;

        if let Some(shell) = &ctx.environment.shell {
            let path = shell.internal_dir.join(DISPATCH_SCRIPT);
            let script = render_script(ctx, &[exec_line(ctx, &["dispatch"], "\"$@\"")?])?;
            write_script(&path, &script)?;
            output.artifact(path);
        }

        let store = ctx.app.config_store();
        if store.write_sample_if_missing()? {
            output.note(format!(
                "wrote sample configuration to {}; add [[slave]] entries there",
                store.config_path().display()
            ));
        }

        let processes = ctx.registry.ids(Category::Process);
        let senders = ctx.registry.ids(Category::Sender);
        output.note(format!("processes available: {}", processes.join(", ")));
        output.note(format!("senders available: {}", senders.join(", ")));
        Ok(output)
    }
}

/// Slave side: the endpoint remote masters post to.
#[derive(Debug, Clone, Copy)]
pub struct SlaveServer;

impl Installable for SlaveServer {
    fn check(&self, ctx: &InstallContext<'_>) -> anyhow::Result<()> {
        ctx.environment.require_persistent_dir()?;
        ctx.environment.require_execute_command()?;
        if ctx.environment.cgi.is_none() && ctx.environment.shell.is_none() {
            bail!("the provider offers neither a CGI nor a shell capability");
        }
        Ok(())
    }

    fn execute(&self, ctx: &InstallContext<'_>) -> anyhow::Result<InstallOutput> {
        let mut output = InstallOutput::default();
        prepare_persistent_dir(ctx)?;

        if let Some(cgi) = &ctx.environment.cgi {
            let path = cgi.internal_dir.join(SLAVE_CGI_SCRIPT);
            let script = render_script(ctx, &[exec_line(ctx, &["receive"], "")?])?;
            write_script(&path, &script)?;
            output.artifact(path);
            output.note(format!(
                "masters reach this slave at {}/{}",
                cgi.url.as_str().trim_end_matches('/'),
                SLAVE_CGI_SCRIPT
            ));
        }

        if let Some(shell) = &ctx.environment.shell {
            let path = shell.internal_dir.join(RECEIVE_SCRIPT);
            let script = render_script(ctx, &[exec_line(ctx, &["receive"], "\"$@\"")?])?;
            write_script(&path, &script)?;
            output.artifact(path);
        }
        Ok(output)
    }
}
