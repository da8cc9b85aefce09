//! Files generated by installers: entry scripts and their digests.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::context::{CONFIG_DIR_ENV, PLUGINS_DIR_ENV, STATE_DIR_ENV};

use super::InstallContext;

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Render a `/bin/sh` script that exports the conduit directories of this
/// installation and then runs `body`.
///
/// The exported state directory is the one holding `installed.json`, so the
/// script sees exactly the components this installer records.
pub fn render_script(ctx: &InstallContext<'_>, body: &[String]) -> anyhow::Result<String> {
    let mut lines = vec![
        "#!/bin/sh".to_string(),
        format!("# Generated by conduit-install for {}.", ctx.component),
        format!("{}={}", CONFIG_DIR_ENV, quote_path(ctx.app.config_dir())),
        format!("{}={}", STATE_DIR_ENV, quote_path(ctx.app.state_dir())),
        format!("{}={}", PLUGINS_DIR_ENV, quote_path(ctx.app.plugins_dir())),
        format!("export {} {} {}", CONFIG_DIR_ENV, STATE_DIR_ENV, PLUGINS_DIR_ENV),
    ];
    lines.extend(body.iter().cloned());
    let mut script = lines.join("\n");
    script.push('\n');
    Ok(script)
}

/// `exec <command> <args...> "$@"` using the provider's execute command.
pub fn exec_line(ctx: &InstallContext<'_>, args: &[&str], forward: &str) -> anyhow::Result<String> {
    let command = ctx.environment.require_execute_command()?;
    let mut parts = vec!["exec".to_string(), quote_path(command)];
    parts.extend(args.iter().map(|a| shell_quote(a)));
    if !forward.is_empty() {
        parts.push(forward.to_string());
    }
    Ok(parts.join(" "))
}

/// Write an executable script, creating parent directories.
pub fn write_script(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content)
        .with_context(|| format!("Failed to write script: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to make script executable: {}", path.display()))?;
    }
    tracing::debug!("Wrote script {}", path.display());
    Ok(())
}

/// blake3 digest of a file as hex.
pub fn digest_file(path: &Path) -> anyhow::Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read artifact: {}", path.display()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
