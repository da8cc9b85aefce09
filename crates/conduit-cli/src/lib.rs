//! Helpers shared by the `conduit` and `conduit-install` binaries.

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conduit_core::context::AppContext;
use conduit_core::error::ConduitError;
use conduit_core::plugin::{PluginDescriptor, VarKind, VarOption};

/// Initialize tracing on stderr. `RUST_LOG` wins over `debug`.
///
/// Stdout is left to command output, which for `conduit receive` is the CGI
/// response.
pub fn init_tracing(debug: bool) {
    let default = if debug { "conduit=debug,info" } else { "conduit=info,warn" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

pub fn load_context() -> Result<AppContext, ConduitError> {
    AppContext::from_env().map_err(ConduitError::Config)
}

/// Print `err` to stderr and map it to its exit code.
pub fn report_error(err: &ConduitError) -> ExitCode {
    eprintln!("error: {}", err);
    if let ConduitError::CommandLine {
        usage: Some(usage), ..
    } = err
    {
        eprintln!();
        eprintln!("{}", usage.trim_end());
    }
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}

/// One line describing a plugin option, e.g. `--event/-E <EVENT> (mandatory)`.
pub fn describe_option(option: &VarOption) -> String {
    let mut line = option.flag_display();
    match option.kind {
        VarKind::Flag => {}
        VarKind::Value => line.push_str(&format!(" <{}>", option.name.to_uppercase())),
        VarKind::List => line.push_str(&format!(" <{}>...", option.name.to_uppercase())),
    }
    let mut notes = Vec::new();
    if option.mandatory {
        notes.push("mandatory".to_string());
    }
    if let Some(default) = &option.default {
        notes.push(format!("default: {}", default));
    }
    if !notes.is_empty() {
        line.push_str(&format!(" ({})", notes.join(", ")));
    }
    if !option.help.is_empty() {
        line = format!("{:<40} {}", line, option.help);
    }
    line
}

/// Header line for `--detailedlist`.
pub fn describe_plugin(path: &str, descriptor: &PluginDescriptor) -> String {
    let mut line = format!("{} {}", path, descriptor.version);
    if !descriptor.author.is_empty() {
        line.push_str(&format!(" by {}", descriptor.author));
    }
    line
}
