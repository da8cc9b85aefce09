//! Plugins defined by TOML manifests instead of code.
//!
//! An adapter manifest lives at `adapter/<Product>/<Tool>/<Action>.toml` and
//! names an external command:
//!
//! ```toml
//! description = "Reject a duplicate ticket in Trac"
//! version = "1.0.0"
//! command = "/usr/local/bin/trac-admin-action"
//! args = ["{trac_env}", "reject-duplicate"]
//!
//! [[option]]
//! name = "trac_env"
//! mandatory = true
//! help = "Path of the Trac environment"
//! ```
//!
//! A process manifest lives at `process/<Event>.toml` and lists the actions it
//! emits. Emitted parameters substitute `{name}` from bound variables and
//! `{0}`, `{1}`, ... from positional arguments.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::actions::SlaveActions;
use crate::types::Category;

use super::descriptor::{PluginDescriptor, VarOption};
use super::options::PluginVars;
use super::registry::PluginContext;
use super::{Adapter, Installable, PluginInstance, Process};

fn default_version() -> semver::Version {
    semver::Version::new(0, 1, 0)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AdapterManifest {
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default = "default_version")]
    version: semver::Version,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default, rename = "option")]
    options: Vec<VarOption>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessManifest {
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default = "default_version")]
    version: semver::Version,
    #[serde(default, rename = "option")]
    options: Vec<VarOption>,
    #[serde(default)]
    emit: Vec<EmitEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmitEntry {
    tool: String,
    action: String,
    #[serde(default)]
    params: Vec<String>,
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))
}

fn parse<T: serde::de::DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    toml::from_str(content).map_err(|e| crate::config::parser::toml_error(e, content))
}

fn descriptor_from(
    id: &str,
    version: semver::Version,
    description: String,
    author: String,
    options: Vec<VarOption>,
) -> anyhow::Result<PluginDescriptor> {
    let mut descriptor = PluginDescriptor::new(id, version)
        .with_description(description)
        .with_author(author);
    descriptor.options = options.into_iter().map(VarOption::normalized).collect();
    descriptor.validate()?;
    Ok(descriptor)
}

/// Parse the descriptor of a manifest plugin.
pub fn read_descriptor(category: Category, id: &str, path: &Path) -> anyhow::Result<PluginDescriptor> {
    let content = read(path)?;
    match category {
        Category::Adapter => {
            let m: AdapterManifest = parse(&content)
                .with_context(|| format!("Invalid adapter manifest: {}", path.display()))?;
            descriptor_from(id, m.version, m.description, m.author, m.options)
        }
        Category::Process => {
            let m: ProcessManifest = parse(&content)
                .with_context(|| format!("Invalid process manifest: {}", path.display()))?;
            descriptor_from(id, m.version, m.description, m.author, m.options)
        }
        other => bail!("{} plugins cannot be defined by manifest", other),
    }
}

/// Construct the instance described by a manifest.
pub fn build(
    category: Category,
    id: &str,
    path: &Path,
    ctx: &PluginContext<'_>,
) -> anyhow::Result<PluginInstance> {
    let content = read(path)?;
    match category {
        Category::Adapter => {
            let m: AdapterManifest = parse(&content)
                .with_context(|| format!("Invalid adapter manifest: {}", path.display()))?;
            let args = m
                .args
                .iter()
                .map(|arg| substitute(arg, |name| ctx.vars.render(name)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(PluginInstance::Adapter(Box::new(CommandAdapter {
                id: id.to_string(),
                command: m.command,
                args,
            })))
        }
        Category::Process => {
            let m: ProcessManifest = parse(&content)
                .with_context(|| format!("Invalid process manifest: {}", path.display()))?;
            Ok(PluginInstance::Process(Box::new(TemplateProcess {
                emit: m.emit,
                vars: ctx.vars.clone(),
            })))
        }
        other => bail!("{} plugins cannot be defined by manifest", other),
    }
}

/// Replace `{name}` placeholders using `lookup`. `{{` and `}}` escape braces.
pub fn substitute<F>(template: &str, lookup: F) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    bail!("unterminated placeholder in '{}'", template);
                }
                match lookup(name.trim()) {
                    Some(value) => out.push_str(&value),
                    None => bail!("placeholder '{{{}}}' is not defined", name.trim()),
                }
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Adapter that runs an external program per action occurrence.
#[derive(Debug)]
pub struct CommandAdapter {
    id: String,
    command: String,
    args: Vec<String>,
}

impl CommandAdapter {
    fn resolve(&self) -> Option<PathBuf> {
        let candidate = Path::new(&self.command);
        if self.command.contains(std::path::MAIN_SEPARATOR) || self.command.contains('/') {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(&self.command))
            .find(|full| full.is_file())
    }
}

impl Installable for CommandAdapter {
    fn check(&self, _ctx: &crate::install::InstallContext<'_>) -> anyhow::Result<()> {
        match self.resolve() {
            Some(path) => {
                tracing::debug!("Adapter '{}' resolved command to {}", self.id, path.display());
                Ok(())
            }
            None => bail!("command '{}' was not found", self.command),
        }
    }
}

impl Adapter for CommandAdapter {
    fn apply(&self, user: &str, params: &[String]) -> anyhow::Result<()> {
        tracing::debug!("Running {} for adapter '{}'", self.command, self.id);
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(user)
            .args(params)
            .output()
            .with_context(|| format!("Failed to run '{}'", self.command))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

/// Process that emits a fixed list of templated actions.
#[derive(Debug)]
pub struct TemplateProcess {
    emit: Vec<EmitEntry>,
    vars: PluginVars,
}

impl Process for TemplateProcess {
    fn run(&self, args: &[String]) -> anyhow::Result<SlaveActions> {
        let lookup = |name: &str| match name.parse::<usize>() {
            Ok(index) => args.get(index).cloned(),
            Err(_) => self.vars.render(name),
        };
        let mut actions = SlaveActions::new();
        for entry in &self.emit {
            let params = entry
                .params
                .iter()
                .map(|p| substitute(p, lookup))
                .collect::<anyhow::Result<Vec<_>>>()
                .with_context(|| format!("Failed to build {}/{}", entry.tool, entry.action))?;
            actions.push(entry.tool.clone(), entry.action.clone(), params);
        }
        Ok(actions)
    }
}
