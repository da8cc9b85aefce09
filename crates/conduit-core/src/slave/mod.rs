//! Slave-side execution of delivered actions.
//!
//! Every action occurrence runs against every installed adapter registered for
//! its (tool, action), whatever the product. An action nobody handles is a
//! warning. A failing adapter is recorded and the batch continues.

pub mod cgi;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::actions::SlaveActions;
use crate::context::AppContext;
use crate::error::{ActionFailure, ConduitError};
use crate::plugin::{Adapter, PluginRegistry};
use crate::types::AdapterTriple;

/// Outcome of one slave dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlaveReport {
    /// Adapter invocations attempted.
    pub attempted: usize,
    pub succeeded: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct SlaveDispatch<'a> {
    registry: &'a PluginRegistry,
    app: &'a AppContext,
}

impl<'a> SlaveDispatch<'a> {
    pub fn new(registry: &'a PluginRegistry, app: &'a AppContext) -> Self {
        Self { registry, app }
    }

    pub fn execute(&self, user: &str, actions: &SlaveActions) -> Result<SlaveReport, ConduitError> {
        let installed = self
            .app
            .installed_store()
            .load()
            .map_err(ConduitError::Registry)?;

        let mut report = SlaveReport::default();
        let mut failures = Vec::new();
        let mut adapters: BTreeMap<String, Result<Box<dyn Adapter>, String>> = BTreeMap::new();

        for (tool, action, params) in actions.occurrences() {
            let records = installed.adapters_for(tool, action);
            if records.is_empty() {
                let warning = format!(
                    "no adapter is installed for {}",
                    AdapterTriple::new("*", tool, action)
                );
                tracing::warn!("{}", warning);
                report.warnings.push(warning);
                continue;
            }

            for record in records {
                report.attempted += 1;
                let product = record
                    .adapter
                    .as_ref()
                    .map(|t| t.product.clone())
                    .unwrap_or_default();
                let adapter = adapters.entry(record.component.clone()).or_insert_with(|| {
                    self.registry
                        .load_adapter(record.id(), &record.parameters, self.app)
                        .map_err(|e| e.to_string())
                });

                let result = match adapter {
                    Ok(adapter) => adapter
                        .apply(user, params)
                        .map_err(|e| format!("{:#}", e)),
                    Err(message) => Err(message.clone()),
                };
                match result {
                    Ok(()) => {
                        tracing::info!("Applied {}/{}/{} for {}", product, tool, action, user);
                        report.succeeded += 1;
                    }
                    Err(message) => {
                        tracing::error!("{}/{}/{} failed: {}", product, tool, action, message);
                        failures.push(ActionFailure {
                            product,
                            tool: tool.to_string(),
                            action: action.to_string(),
                            params: params.to_vec(),
                            message,
                        });
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(ConduitError::ActionsFailed { failures, report })
        }
    }
}
