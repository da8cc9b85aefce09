//! Conduit - dispatch runtime
//!
//! Usage:
//!   conduit dispatch <EVENT> --user <USER> [-- <ARGS>...]   # master side
//!   conduit receive                                         # slave CGI entry
//!   conduit status [--verify] [--format json]               # installed components

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use conduit_cli::{init_tracing, load_context, report_error};
use conduit_core::error::ConduitError;
use conduit_core::master::{DispatchReport, MasterDispatch};
use conduit_core::slave::{SlaveDispatch, cgi};
use conduit_core::status::{ArtifactIntegrity, SystemStatus, collect_status};

#[derive(Parser)]
#[command(name = "conduit")]
#[command(version, about = "Dispatch events between collaboration tools", long_about = None)]
struct Cli {
    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the process for an event and deliver its actions to slaves
    Dispatch {
        /// Event (process ID) to dispatch
        event: String,

        /// User the event is attributed to
        #[arg(short, long)]
        user: String,

        /// Options and arguments for the process
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Apply a delivery read as a CGI request from stdin
    Receive,

    /// Show installed components
    Status {
        /// Verify generated files against their recorded digests
        #[arg(long)]
        verify: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Dispatch { event, user, args } => run_dispatch(&event, &user, &args),
        Commands::Receive => run_receive(),
        Commands::Status { verify, format } => run_status(verify, format),
    };

    match result {
        Ok(code) => code,
        Err(err) => report_error(&err),
    }
}

fn run_dispatch(event: &str, user: &str, args: &[String]) -> Result<ExitCode, ConduitError> {
    let ctx = load_context()?;
    let registry = ctx.plugin_registry();
    let dispatch = MasterDispatch::from_config(&registry, &ctx)?;
    if dispatch.clients().is_empty() {
        tracing::warn!(
            "No slave clients are configured in {}",
            ctx.config_store().config_path().display()
        );
    }

    match dispatch.execute(event, user, args) {
        Ok(report) => {
            print_dispatch(&report);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if let ConduitError::ClientsFailed { report, .. } = &err {
                print_dispatch(report);
            }
            Err(err)
        }
    }
}

fn print_dispatch(report: &DispatchReport) {
    println!("Event '{}': {} action(s)", report.event, report.actions);
    for name in &report.delivered {
        println!("  ✓ delivered to {}", name);
    }
    for name in &report.skipped {
        println!("  • skipped {} (no relevant tools)", name);
    }
    for name in &report.failed {
        println!("  ✗ failed for {}", name);
    }
}

fn run_receive() -> Result<ExitCode, ConduitError> {
    let ctx = load_context()?;
    let registry = ctx.plugin_registry();
    let dispatch = SlaveDispatch::new(&registry, &ctx);

    let method = std::env::var("REQUEST_METHOD").unwrap_or_else(|_| "POST".to_string());
    let content_length = std::env::var("CONTENT_LENGTH").ok();
    let response = cgi::serve(
        &dispatch,
        &method,
        content_length.as_deref(),
        std::io::stdin().lock(),
    );

    print!("{}", response.render());
    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_status(verify: bool, format: OutputFormat) -> Result<ExitCode, ConduitError> {
    let ctx = load_context()?;
    let status =
        collect_status(&ctx.installed_store(), verify).map_err(ConduitError::Registry)?;

    match format {
        OutputFormat::Table => print_table(&status, verify),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&status)
                .map_err(|e| ConduitError::Registry(e.into()))?;
            println!("{}", json);
        }
    }

    Ok(if verify && status.summary.issues > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_table(status: &SystemStatus, verify: bool) {
    println!("State: {}", status.state_dir.display());
    println!();

    if status.components.is_empty() {
        println!("No components installed.");
        println!("Start with: conduit-install --install Server/Master");
        return;
    }

    println!(
        "{:<50} {:<10} {:<10} Installed",
        "Component", "Version", "Provider"
    );
    println!("{}", "-".repeat(90));
    for component in &status.components {
        let marker = if component.has_issues() { "⚠" } else { " " };
        println!(
            "{}{:<49} {:<10} {:<10} {}",
            marker,
            component.component,
            component.version,
            component.provider,
            component.installed_at.format("%Y-%m-%d %H:%M UTC")
        );
        if verify {
            for artifact in &component.artifacts {
                let state = match artifact.integrity {
                    ArtifactIntegrity::Ok => "✓ ok",
                    ArtifactIntegrity::Modified => "⚠ modified",
                    ArtifactIntegrity::Missing => "✗ missing",
                    ArtifactIntegrity::Unchecked => "  unchecked",
                };
                println!("    {} {}", state, artifact.path.display());
            }
        }
    }

    println!();
    if verify && status.summary.issues > 0 {
        println!(
            "Summary: {} component(s), {} artifact issue(s)",
            status.summary.total, status.summary.issues
        );
    } else {
        println!(
            "Summary: {} component(s), {} adapter(s)",
            status.summary.total, status.summary.adapters
        );
    }
}
