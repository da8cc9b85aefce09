//! conduit-install - activate servers, adapters, listeners and providers
//!
//! Usage:
//!   conduit-install --list
//!   conduit-install --install Server/Master -- --shell-dir /usr/local/bin
//!   conduit-install --install Adapter/<Product>/<Tool>/<Action> [--provider Local] -- <options>

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use conduit_cli::{describe_option, describe_plugin, init_tracing, load_context, report_error};
use conduit_core::error::ConduitError;
use conduit_core::install::{InstallReport, InstallRequest, Installer, installable_components};
use conduit_core::plugin::PluginRegistry;

#[derive(Parser)]
#[command(name = "conduit-install")]
#[command(version, about = "Install conduit components", long_about = None)]
#[command(disable_version_flag = true, disable_help_flag = true)]
struct Cli {
    /// Component to install, as <Category>/<ID>
    #[arg(long, value_name = "PATH")]
    install: Option<String>,

    /// Provider supplying the environment (default: Local)
    #[arg(long, value_name = "ID")]
    provider: Option<String>,

    /// Reinstall over an existing installation
    #[arg(short, long)]
    force: bool,

    /// List installable components
    #[arg(short, long)]
    list: bool,

    /// List installable components with their versions and options
    #[arg(short = 'e', long)]
    detailedlist: bool,

    /// Verbose logging on stderr
    #[arg(short, long)]
    debug: bool,

    /// Print help, including the options of --install's component and provider
    #[arg(short, long)]
    help: bool,

    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Options for the component and its provider
    #[arg(last = true)]
    plugin_args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_error(&err),
    }
}

fn run(cli: Cli) -> Result<(), ConduitError> {
    let ctx = load_context()?;
    let registry = ctx.plugin_registry();

    let request = cli.install.as_ref().map(|component| {
        let mut request = InstallRequest::new(component.as_str())
            .with_force(cli.force)
            .with_args(cli.plugin_args.iter().cloned());
        if let Some(provider) = &cli.provider {
            request = request.with_provider(provider.as_str());
        }
        request
    });

    if cli.help {
        println!("{}", Cli::command().render_help());
        if let Some(request) = &request {
            let usage = Installer::new(&registry, &ctx).usage(request)?;
            println!("Options for {} (pass after --):", request.component);
            println!("{}", usage);
        }
        return Ok(());
    }

    if cli.list || cli.detailedlist {
        print_components(&registry, cli.detailedlist);
    }

    match request {
        Some(request) => {
            let report = Installer::new(&registry, &ctx).install(&request)?;
            print_report(&report);
            Ok(())
        }
        None if cli.list || cli.detailedlist => Ok(()),
        None => Err(ConduitError::CommandLine {
            message: "nothing to do; pass --install, --list or --detailedlist".to_string(),
            usage: Some(Cli::command().render_help().to_string()),
        }),
    }
}

fn print_components(registry: &PluginRegistry, detailed: bool) {
    for (category, descriptors) in installable_components(registry) {
        println!("{}:", category);
        if descriptors.is_empty() {
            println!("  (none)");
        }
        for descriptor in descriptors {
            if detailed {
                let path = format!("{}/{}", category, descriptor.id);
                println!("  {}", describe_plugin(&path, &descriptor));
                if !descriptor.description.is_empty() {
                    println!("      {}", descriptor.description);
                }
                for option in &descriptor.options {
                    println!("      {}", describe_option(option));
                }
            } else {
                println!("  {:<40} {}", descriptor.id, descriptor.description);
            }
        }
        println!();
    }
}

fn print_report(report: &InstallReport) {
    println!(
        "✓ Installed {} (provider {})",
        report.component, report.provider
    );
    if report.replaced {
        println!("  replaced the previous installation");
    }
    for path in report.record.artifacts.keys() {
        println!("  wrote {}", path);
    }
    for note in &report.notes {
        println!("  • {}", note);
    }
}
