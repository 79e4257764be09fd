//! CLI Commands

pub mod desktop;
pub mod reset;

use clap::Subcommand;
use thiserror::Error;

use deskprobe_driver::playwright::PlaywrightConfig;
use deskprobe_driver::{ActionRequest, SiteConfig};

use crate::output::OutputFormat;

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show status of desktop
    Status,

    /// Launch a desktop
    Launch,

    /// Delete the desktop
    Delete,

    /// Boost the desktop
    Boost,

    /// Downsize the desktop
    Downsize,

    /// Shelve the desktop
    Shelve,

    /// Unshelve the desktop
    Unshelve,

    /// Reboot the desktop
    Reboot {
        /// Do a hard reboot
        #[arg(long)]
        hard: bool,
    },

    /// Run a scenario
    Scenario {
        /// Name of the scenario (basic, lifecycle, newuser)
        name: String,

        /// Arguments for the scenario itself
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Clear database errors for the test account
    Reset {
        /// Run remediations even if no errors are reported
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Status => "status",
            Commands::Launch => "launch",
            Commands::Delete => "delete",
            Commands::Boost => "boost",
            Commands::Downsize => "downsize",
            Commands::Shelve => "shelve",
            Commands::Unshelve => "unshelve",
            Commands::Reboot { .. } => "reboot",
            Commands::Scenario { .. } => "scenario",
            Commands::Reset { .. } => "reset",
        }
    }
}

/// Bad configuration or usage; exits with status 2 rather than 1.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct UsageError(pub String);

impl UsageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Everything a command needs, resolved from the config file and flags.
pub struct Context {
    pub site_name: String,
    pub site: SiteConfig,
    pub request: ActionRequest,
    pub playwright: PlaywrightConfig,
    pub format: OutputFormat,
}
