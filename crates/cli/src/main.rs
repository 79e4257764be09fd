//! deskprobe CLI - Main Entry Point
//!
//! Performs scripted actions on a virtual desktop site. This is primarily
//! intended for running functional tests, optionally reporting the result
//! as a Nagios passive check.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

mod commands;
mod db;
mod output;
mod report;

use commands::{desktop, reset, Commands, Context, UsageError};
use deskprobe_driver::playwright::{Browser, PlaywrightConfig};
use deskprobe_driver::{
    ActionRequest, ConfigFile, DesktopType, DriverError, EventReporter, Outcome, SiteConfig, Zone,
};
use output::{print_error, print_warning, OutputFormat};
use report::NagiosReporter;

/// deskprobe - functional lifecycle checks for a virtual desktop service
#[derive(Parser)]
#[command(name = "deskprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (default: ~/.deskprobe.toml)
    #[arg(short, long, env = "DESKPROBE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Site to interact with: a section name in the config file
    #[arg(short, long, global = true)]
    site: Option<String>,

    /// Show the "progress bar" information while waiting
    #[arg(short = 'p', long, global = true)]
    show_progress: bool,

    /// Show debug-level logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Report the result as a Nagios event
    #[arg(long, global = true)]
    nagios: bool,

    /// Type of desktop to launch
    #[arg(long, global = true)]
    desktop: Option<String>,

    /// Availability zone to launch in
    #[arg(short, long, global = true)]
    zone: Option<String>,

    /// User name for the tests (overrides the config file)
    #[arg(long, global = true)]
    username: Option<String>,

    /// Password for the tests (overrides the config file)
    #[arg(long, env = "DESKPROBE_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Browser engine
    #[arg(long, value_enum, default_value = "chromium", global = true)]
    browser: Browser,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&format!("{:#}", e));
            if e.chain().any(|cause| cause.is::<UsageError>()) {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(ConfigFile::default_path);
    let config = ConfigFile::load(&config_path).map_err(usage)?;
    let (site_name, mut site) = config.site(cli.site.as_deref()).map_err(usage)?;
    if let Some(username) = &cli.username {
        site.username = username.clone();
    }
    if let Some(password) = &cli.password {
        site.password = password.clone();
    }

    let service = if cli.nagios {
        Some(nagios_service_name(&cli)?)
    } else {
        None
    };

    let ctx = Context {
        request: action_request(&cli),
        playwright: PlaywrightConfig {
            browser: cli.browser,
            headless: !cli.headed,
            ..Default::default()
        },
        format: cli.format,
        site_name,
        site,
    };

    let action = cli.command.name();
    let result = match &cli.command {
        Commands::Reset { force } => reset::execute(*force, &ctx).await,
        command => desktop::execute(command, &ctx).await,
    };

    if let Some(service) = service {
        report_outcome(&ctx.site, &service, action, &result).await;
    }

    result.with_context(|| {
        format!(
            "deskprobe failure for action {} on site {}",
            action, ctx.site_name
        )
    })
}

fn action_request(cli: &Cli) -> ActionRequest {
    ActionRequest {
        desktop_type: cli.desktop.as_deref().map(DesktopType::new),
        zone: cli.zone.as_deref().map(Zone::new),
        hard: false,
        show_progress: cli.show_progress,
    }
}

fn usage(e: DriverError) -> anyhow::Error {
    UsageError::new(e.to_string()).into()
}

/// Service name for `--nagios`, which needs a zone, desktop type and scenario.
fn nagios_service_name(cli: &Cli) -> Result<String> {
    match (&cli.zone, &cli.desktop, &cli.command) {
        (Some(zone), Some(desktop), Commands::Scenario { name, .. }) => {
            Ok(NagiosReporter::service_name(zone, name, desktop))
        }
        _ => Err(UsageError::new("Nagios reporting needs a zone, desktop type and scenario").into()),
    }
}

async fn report_outcome(site: &SiteConfig, service: &str, action: &str, result: &Result<()>) {
    let Some(settings) = &site.nagios else {
        print_warning(
            "Missing nagios settings (target_host, url, token) for the selected site. \
             Skipping Nagios reporting.",
        );
        return;
    };

    let outcome = match result {
        Ok(()) => Outcome::passed(action),
        Err(e) => Outcome::failed(action, &format!("{:#}", e)),
    };
    match NagiosReporter::new(settings).report(service, &outcome).await {
        Ok(Some(message)) => info!("Nagios NRDP returned: {}", message),
        Ok(None) => {}
        Err(e) => {
            error!("{}", e);
            print_error(&e.to_string());
        }
    }
}
