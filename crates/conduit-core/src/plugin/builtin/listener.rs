use anyhow::bail;

use crate::install::artifacts::{exec_line, render_script, shell_quote, write_script};
use crate::install::{InstallContext, InstallOutput};
use crate::plugin::{Installable, PluginVars};
use crate::types::Category;

/// Shell hook an originating tool calls as `conduit-hook-<event> USER [ARGS...]`.
#[derive(Debug, Clone)]
pub struct ShellHook {
    event: String,
}

impl ShellHook {
    pub fn from_vars(vars: &PluginVars) -> anyhow::Result<Self> {
        let event = vars.require_text("event")?.to_string();
        if event.is_empty()
            || !event
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            bail!("event name '{}' may only contain letters, digits, '_' and '-'", event);
        }
        Ok(Self { event })
    }

    pub fn script_name(&self) -> String {
        format!("conduit-hook-{}", self.event)
    }
}

impl Installable for ShellHook {
    fn check(&self, ctx: &InstallContext<'_>) -> anyhow::Result<()> {
        ctx.environment.require_shell()?;
        ctx.environment.require_execute_command()?;
        if !ctx.registry.is_known(Category::Process, &self.event) {
            bail!("no process is registered for event '{}'", self.event);
        }
        Ok(())
    }

    fn execute(&self, ctx: &InstallContext<'_>) -> anyhow::Result<InstallOutput> {
        let shell = ctx.environment.require_shell()?;
        let path = shell.internal_dir.join(self.script_name());
        let body = vec![
            "[ $# -ge 1 ] || { echo \"usage: $0 USER [ARGS...]\" >&2; exit 2; }".to_string(),
            "user=\"$1\"".to_string(),
            "shift".to_string(),
            exec_line(
                ctx,
                &["dispatch", self.event.as_str(), "--user"],
                "\"$user\" -- \"$@\"",
            )?,
        ];
        write_script(&path, &render_script(ctx, &body)?)?;

        let mut output = InstallOutput::default();
        output.note(format!(
            "configure the originating tool to run {} on {}",
            shell_quote(&path.to_string_lossy()),
            self.event
        ));
        output.artifact(path);
        Ok(output)
    }
}
