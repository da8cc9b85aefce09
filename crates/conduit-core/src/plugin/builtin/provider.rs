use std::path::PathBuf;

use anyhow::{Context, bail};
use url::Url;

use crate::context::AppContext;
use crate::install::{InstallContext, InstallOutput};
use crate::plugin::{Installable, PluginVars, Provider};
use crate::provider::{CgiCapability, ProviderEnvironment, ShellCapability};

/// Provider for the host conduit runs on.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    persistent_dir: PathBuf,
    shell_dir: Option<PathBuf>,
    cgi_url: Option<String>,
    cgi_dir: Option<PathBuf>,
    execute_command: Option<PathBuf>,
}

impl LocalProvider {
    pub fn from_vars(vars: &PluginVars, app: &AppContext) -> Self {
        Self {
            persistent_dir: vars
                .text("persistent_dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| app.state_dir().to_path_buf()),
            shell_dir: vars.text("shell_dir").map(PathBuf::from),
            cgi_url: vars.text("cgi_url").map(str::to_string),
            cgi_dir: vars.text("cgi_dir").map(PathBuf::from),
            execute_command: vars
                .text("execute_command")
                .map(PathBuf::from)
                .or_else(default_execute_command),
        }
    }
}

/// The `conduit` binary installed next to the running executable.
fn default_execute_command() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let sibling = exe
        .parent()?
        .join(format!("conduit{}", std::env::consts::EXE_SUFFIX));
    sibling.is_file().then_some(sibling)
}

impl Provider for LocalProvider {
    fn environment(&self) -> anyhow::Result<ProviderEnvironment> {
        let cgi = match (&self.cgi_url, &self.cgi_dir) {
            (Some(url), Some(dir)) => Some(CgiCapability {
                url: Url::parse(url).with_context(|| format!("invalid --cgi-url '{}'", url))?,
                internal_dir: dir.clone(),
            }),
            (None, None) => None,
            (Some(_), None) => bail!("--cgi-url requires --cgi-dir"),
            (None, Some(_)) => bail!("--cgi-dir requires --cgi-url"),
        };

        Ok(ProviderEnvironment {
            cgi,
            shell: self.shell_dir.clone().map(|internal_dir| ShellCapability { internal_dir }),
            persistent_dir: Some(self.persistent_dir.clone()),
            execute_command: self.execute_command.clone(),
        })
    }
}

impl Installable for LocalProvider {
    fn execute(&self, ctx: &InstallContext<'_>) -> anyhow::Result<InstallOutput> {
        let mut output = InstallOutput::default();
        let dirs = [
            ctx.environment.persistent_dir.clone(),
            ctx.environment.shell.as_ref().map(|s| s.internal_dir.clone()),
            ctx.environment.cgi.as_ref().map(|c| c.internal_dir.clone()),
        ];
        for dir in dirs.into_iter().flatten() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            output.note(format!("prepared {}", dir.display()));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppContext {
        AppContext::new(PathBuf::from("/etc/conduit"), PathBuf::from("/var/lib/conduit"))
    }

    #[test]
    fn test_persistent_dir_defaults_to_state_dir() {
        let provider = LocalProvider::from_vars(&PluginVars::new(), &app());
        let env = provider.environment().unwrap();
        assert_eq!(env.persistent_dir, Some(PathBuf::from("/var/lib/conduit")));
        assert!(env.cgi.is_none());
        assert!(env.shell.is_none());
    }

    #[test]
    fn test_cgi_url_without_dir_is_rejected() {
        let vars = PluginVars::new().with_text("cgi_url", "http://example.org/cgi-bin");
        let err = LocalProvider::from_vars(&vars, &app())
            .environment()
            .unwrap_err();
        assert!(err.to_string().contains("--cgi-dir"));
    }

    #[test]
    fn test_full_environment() {
        let vars = PluginVars::new()
            .with_text("cgi_url", "http://example.org/cgi-bin/")
            .with_text("cgi_dir", "/srv/cgi-bin")
            .with_text("shell_dir", "/usr/local/bin")
            .with_text("execute_command", "/usr/bin/conduit");
        let env = LocalProvider::from_vars(&vars, &app()).environment().unwrap();
        assert_eq!(
            env.require_cgi().unwrap().url.as_str(),
            "http://example.org/cgi-bin/"
        );
        assert_eq!(env.require_execute_command().unwrap(), PathBuf::from("/usr/bin/conduit"));
        assert_eq!(env.capabilities().len(), 4);
    }
}
