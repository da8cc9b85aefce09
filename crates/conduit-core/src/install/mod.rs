//! Two-phase installation of one component against one provider.
//!
//! The installer walks a component through
//! `Uninstalled -> Checked -> Installed | Failed`. Everything that can be
//! decided without side effects (path, prerequisites, options, provider
//! environment, the plugin's own `check`) happens before `execute`. A failed
//! `execute` leaves behind whatever it already changed; no record is written.

pub mod artifacts;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::context::AppContext;
use crate::error::ConduitError;
use crate::installed::InstalledComponentRecord;
use crate::plugin::{
    ComposedOptions, OptionComposer, PluginDescriptor, PluginInstance, PluginRegistry, PluginVars,
};
use crate::provider::ProviderEnvironment;
use crate::types::{AdapterTriple, Category, ComponentPath, MASTER_SERVER, SLAVE_SERVER};

/// Provider used when the request names none.
pub const DEFAULT_PROVIDER: &str = "Local";

/// Flags owned by `conduit-install` itself.
pub const HOST_FLAGS: &[(&str, Option<char>)] = &[
    ("install", None),
    ("provider", None),
    ("force", Some('f')),
    ("list", Some('l')),
    ("detailedlist", Some('e')),
    ("debug", Some('d')),
    ("version", Some('v')),
];

#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub component: String,
    pub provider: Option<String>,
    pub force: bool,
    pub args: Vec<String>,
}

impl InstallRequest {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Uninstalled,
    Checked,
    Installed,
    Failed,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallPhase::Uninstalled => "uninstalled",
            InstallPhase::Checked => "checked",
            InstallPhase::Installed => "installed",
            InstallPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a plugin sees while it is checked and installed.
pub struct InstallContext<'a> {
    pub component: &'a ComponentPath,
    pub provider: &'a str,
    pub environment: &'a ProviderEnvironment,
    pub app: &'a AppContext,
    pub registry: &'a PluginRegistry,
}

/// Files created by `execute` and notes for the operator.
#[derive(Debug, Clone, Default)]
pub struct InstallOutput {
    pub artifacts: Vec<PathBuf>,
    pub notes: Vec<String>,
}

impl InstallOutput {
    pub fn artifact(&mut self, path: PathBuf) {
        self.artifacts.push(path);
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub component: ComponentPath,
    pub provider: String,
    pub phase: InstallPhase,
    /// An earlier record was replaced because of `force`.
    pub replaced: bool,
    pub notes: Vec<String>,
    pub record: InstalledComponentRecord,
}

/// Installable plugins grouped by category, for `--list`.
pub fn installable_components(registry: &PluginRegistry) -> Vec<(Category, Vec<PluginDescriptor>)> {
    Category::ALL
        .into_iter()
        .filter(|c| c.is_installable())
        .map(|c| (c, registry.list(c)))
        .collect()
}

fn required_server(category: Category) -> Option<&'static str> {
    match category {
        Category::Adapter => Some(SLAVE_SERVER),
        Category::Listener => Some(MASTER_SERVER),
        _ => None,
    }
}

struct Prepared {
    path: ComponentPath,
    provider: String,
    component: PluginDescriptor,
    provider_descriptor: Option<PluginDescriptor>,
    options: ComposedOptions,
    replaced: bool,
}

#[derive(Debug)]
pub struct Installer<'a> {
    registry: &'a PluginRegistry,
    app: &'a AppContext,
}

impl<'a> Installer<'a> {
    pub fn new(registry: &'a PluginRegistry, app: &'a AppContext) -> Self {
        Self { registry, app }
    }

    /// Help text of the options `request` would be parsed with.
    pub fn usage(&self, request: &InstallRequest) -> Result<String, ConduitError> {
        let mut request = request.clone();
        request.force = true;
        Ok(self.prepare(&request, false)?.options.usage())
    }

    pub fn install(&self, request: &InstallRequest) -> Result<InstallReport, ConduitError> {
        let prepared = self.prepare(request, true)?;
        let path = &prepared.path;
        tracing::info!(
            "Installing {} with provider '{}' ({})",
            path,
            prepared.provider,
            InstallPhase::Uninstalled
        );

        let parsed = prepared.options.parse(request.args.iter().cloned())?;
        prepared.options.check_mandatory(&parsed)?;
        let component_vars = parsed.vars_for(&prepared.component.id);
        let provider_vars = match &prepared.provider_descriptor {
            Some(descriptor) => parsed.vars_for(&descriptor.id),
            None => component_vars.clone(),
        };

        let (instance, environment) = self.construct(&prepared, &component_vars, &provider_vars)?;
        tracing::debug!(
            "Provider '{}' offers: {}",
            prepared.provider,
            environment.capabilities().join(", ")
        );

        let ctx = InstallContext {
            component: path,
            provider: &prepared.provider,
            environment: &environment,
            app: self.app,
            registry: self.registry,
        };

        instance.check(&ctx).map_err(|source| {
            tracing::warn!("{} {}", path, InstallPhase::Failed);
            ConduitError::CheckFailed {
                path: path.key(),
                source,
            }
        })?;
        tracing::info!("{} {}", path, InstallPhase::Checked);

        let output = instance.execute(&ctx).map_err(|source| {
            tracing::warn!("{} {}", path, InstallPhase::Failed);
            ConduitError::InstallFailed {
                path: path.key(),
                source,
            }
        })?;

        let mut artifacts = BTreeMap::new();
        for artifact in &output.artifacts {
            let digest = artifacts::digest_file(artifact).map_err(|source| {
                ConduitError::InstallFailed {
                    path: path.key(),
                    source,
                }
            })?;
            artifacts.insert(artifact.to_string_lossy().into_owned(), digest);
        }

        let record = InstalledComponentRecord {
            component: path.key(),
            category: path.category(),
            installed_at: chrono::Utc::now(),
            version: prepared.component.version.clone(),
            description: prepared.component.description.clone(),
            author: prepared.component.author.clone(),
            provider: prepared.provider.clone(),
            parameters: component_vars,
            provider_parameters: if prepared.provider_descriptor.is_some() {
                provider_vars
            } else {
                PluginVars::new()
            },
            artifacts,
            adapter: match path.category() {
                Category::Adapter => AdapterTriple::from_id(path.id()),
                _ => None,
            },
        };
        self.app
            .installed_store()
            .record(record.clone())
            .map_err(ConduitError::Registry)?;
        tracing::info!("{} {}", path, InstallPhase::Installed);

        Ok(InstallReport {
            component: path.clone(),
            provider: prepared.provider,
            phase: InstallPhase::Installed,
            replaced: prepared.replaced,
            notes: output.notes,
            record,
        })
    }

    fn prepare(&self, request: &InstallRequest, check_state: bool) -> Result<Prepared, ConduitError> {
        let path = ComponentPath::parse(&request.component).map_err(ConduitError::command_line)?;
        let category = path.category();
        if !category.is_installable() {
            return Err(ConduitError::command_line(format!(
                "{} plugins are activated by Server/{} and cannot be installed on their own",
                category, MASTER_SERVER
            )));
        }

        let component = self
            .registry
            .descriptor(category, path.id())?
            .ok_or_else(|| ConduitError::UnknownComponent { path: path.key() })?;

        let mut replaced = false;
        if check_state {
            let installed = self
                .app
                .installed_store()
                .load()
                .map_err(ConduitError::Registry)?;
            if let Some(existing) = installed.get(&path) {
                if !request.force {
                    return Err(ConduitError::AlreadyInstalled {
                        path: path.key(),
                        installed_at: existing.installed_at.to_rfc3339(),
                    });
                }
                replaced = true;
            }
            if let Some(server) = required_server(category) {
                let server_path = ComponentPath::new(Category::Server, server);
                if !installed.contains(&server_path) {
                    return Err(ConduitError::MissingServer {
                        path: path.key(),
                        server: server_path.key(),
                    });
                }
            }
        }

        let (provider, provider_descriptor) = if category == Category::Provider {
            if let Some(requested) = &request.provider
                && requested != path.id()
            {
                return Err(ConduitError::command_line(format!(
                    "a provider is installed against itself; drop --provider {}",
                    requested
                )));
            }
            (path.id().to_string(), None)
        } else {
            let provider = request
                .provider
                .clone()
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
            let descriptor = self
                .registry
                .descriptor(Category::Provider, &provider)
                .map_err(|e| ConduitError::Provider {
                    provider: provider.clone(),
                    message: e.to_string(),
                })?
                .ok_or_else(|| ConduitError::Provider {
                    provider: provider.clone(),
                    message: "no such provider is registered".to_string(),
                })?;
            (provider, Some(descriptor))
        };

        let mut composer = OptionComposer::new("conduit-install");
        for (long, short) in HOST_FLAGS {
            composer = composer.reserve(long, *short, "conduit-install");
        }
        let mut descriptors = vec![&component];
        if let Some(descriptor) = &provider_descriptor {
            descriptors.push(descriptor);
        }
        let options = composer.compose(&descriptors)?;

        Ok(Prepared {
            path,
            provider,
            component,
            provider_descriptor,
            options,
            replaced,
        })
    }

    fn construct(
        &self,
        prepared: &Prepared,
        component_vars: &PluginVars,
        provider_vars: &PluginVars,
    ) -> Result<(PluginInstance, ProviderEnvironment), ConduitError> {
        let provider_error = |message: String| ConduitError::Provider {
            provider: prepared.provider.clone(),
            message,
        };

        if prepared.provider_descriptor.is_none() {
            let instance = self.registry.load(
                prepared.path.category(),
                prepared.path.id(),
                component_vars,
                self.app,
            )?;
            let environment = match &instance {
                PluginInstance::Provider(provider) => provider
                    .environment()
                    .map_err(|e| provider_error(format!("{:#}", e)))?,
                other => {
                    return Err(provider_error(format!(
                        "plugin built a {} instead of a provider",
                        other.kind_name()
                    )));
                }
            };
            return Ok((instance, environment));
        }

        let provider = self
            .registry
            .load_provider(&prepared.provider, provider_vars, self.app)
            .map_err(|e| provider_error(e.to_string()))?;
        let environment = provider
            .environment()
            .map_err(|e| provider_error(format!("{:#}", e)))?;

        let instance = self.registry.load(
            prepared.path.category(),
            prepared.path.id(),
            component_vars,
            self.app,
        )?;
        if !instance.is_installable() {
            return Err(ConduitError::PluginLoad(crate::error::PluginLoadError::new(
                prepared.path.category(),
                prepared.path.id(),
                format!("factory built a {}, which cannot be installed", instance.kind_name()),
            )));
        }
        Ok((instance, environment))
    }
}
