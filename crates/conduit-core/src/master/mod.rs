//! Master-side dispatch: event -> process -> per-client senders.

use serde::Serialize;

use crate::config::RegisteredSlaveClient;
use crate::context::AppContext;
use crate::error::{ClientFailure, ConduitError};
use crate::plugin::{ComposedOptions, OptionComposer, PluginRegistry};
use crate::types::Category;

/// Outcome of one master dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub event: String,
    /// Action occurrences the process produced.
    pub actions: usize,
    /// Clients that accepted their subset.
    pub delivered: Vec<String>,
    /// Clients that had nothing relevant and were not contacted.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug)]
pub struct MasterDispatch<'a> {
    registry: &'a PluginRegistry,
    app: &'a AppContext,
    clients: Vec<RegisteredSlaveClient>,
}

impl<'a> MasterDispatch<'a> {
    pub fn new(
        registry: &'a PluginRegistry,
        app: &'a AppContext,
        clients: Vec<RegisteredSlaveClient>,
    ) -> Self {
        Self {
            registry,
            app,
            clients,
        }
    }

    /// Dispatch to the clients configured in `conduit.toml`.
    pub fn from_config(registry: &'a PluginRegistry, app: &'a AppContext) -> Result<Self, ConduitError> {
        let config = app.config_store().load().map_err(ConduitError::Config)?;
        Ok(Self::new(registry, app, config.slave_clients()))
    }

    pub fn clients(&self) -> &[RegisteredSlaveClient] {
        &self.clients
    }

    /// Parser for the options of the process handling `event`.
    pub fn process_options(&self, event: &str) -> Result<ComposedOptions, ConduitError> {
        let descriptor = self
            .registry
            .descriptor(Category::Process, event)?
            .ok_or_else(|| ConduitError::UnknownProcess {
                event: event.to_string(),
            })?;
        OptionComposer::new(format!("conduit dispatch {}", event))
            .allow_positional()
            .compose(&[&descriptor])
    }

    pub fn execute(&self, event: &str, user: &str, args: &[String]) -> Result<DispatchReport, ConduitError> {
        if user.trim().is_empty() {
            return Err(ConduitError::command_line("a non-empty --user is required"));
        }

        let options = self.process_options(event)?;
        let parsed = options.parse(args.iter().cloned())?;
        options.check_mandatory(&parsed)?;

        let process = self
            .registry
            .load_process(event, &parsed.vars_for(event), self.app)?;
        let actions = process
            .run(parsed.positional())
            .map_err(|source| ConduitError::ProcessFailed {
                event: event.to_string(),
                source,
            })?;
        tracing::info!(
            "Event '{}' from {} produced {} action(s)",
            event,
            user,
            actions.len()
        );

        let mut report = DispatchReport {
            event: event.to_string(),
            actions: actions.len(),
            ..Default::default()
        };
        let mut failures = Vec::new();

        for client in &self.clients {
            let relevant = actions.filter_for(&client.tools);
            if relevant.is_empty() {
                tracing::debug!("Skipping {}: no relevant tools", client.name);
                report.skipped.push(client.name.clone());
                continue;
            }

            let result = self
                .registry
                .load_sender(&client.kind, self.app)
                .map_err(ConduitError::from)
                .and_then(|sender| sender.send(user, &relevant, &client.params));
            match result {
                Ok(()) => {
                    tracing::info!("Delivered {} action(s) to {}", relevant.len(), client.name);
                    report.delivered.push(client.name.clone());
                }
                Err(error) => {
                    tracing::error!("Delivery to {} failed: {}", client.name, error);
                    report.failed.push(client.name.clone());
                    failures.push(ClientFailure {
                        client: client.name.clone(),
                        error: Box::new(error),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(ConduitError::ClientsFailed { failures, report })
        }
    }
}
