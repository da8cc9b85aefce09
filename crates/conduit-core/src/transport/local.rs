//! In-process delivery to a slave installed on the same host.

use std::path::PathBuf;

use crate::actions::SlaveActions;
use crate::config::ConnectionParams;
use crate::context::AppContext;
use crate::error::ConduitError;
use crate::plugin::{PluginRegistry, Sender};
use crate::slave::SlaveDispatch;

/// Sender that runs the slave dispatcher directly.
///
/// The optional `state_dir` parameter selects another slave installation on
/// this host; by default the master's own state directory is used.
#[derive(Debug, Clone)]
pub struct LocalSender {
    registry: PluginRegistry,
    app: AppContext,
}

impl LocalSender {
    pub fn new(registry: PluginRegistry, app: AppContext) -> Self {
        Self { registry, app }
    }
}

impl Sender for LocalSender {
    fn send(
        &self,
        user: &str,
        actions: &SlaveActions,
        params: &ConnectionParams,
    ) -> Result<(), ConduitError> {
        let app = match params.get("state_dir") {
            Some(dir) => self.app.with_state_dir(PathBuf::from(dir)),
            None => self.app.clone(),
        };
        let report = SlaveDispatch::new(&self.registry, &app).execute(user, actions)?;
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        tracing::debug!(
            "Local slave applied {}/{} action(s)",
            report.succeeded,
            report.attempted
        );
        Ok(())
    }
}
