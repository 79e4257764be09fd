//! Site configuration
//!
//! A config file names one or more sites (deployments of the desktop service)
//! and which one to use by default:
//!
//! ```toml
//! default_site = "staging"
//!
//! [sites.staging]
//! base_url = "https://desktops.staging.example.org"
//! username = "probe-user"
//! password = "secret"
//! desktop_type = "ubuntu"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DriverError, DriverResult};
use crate::state::DesktopType;

/// Whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Site used when none is chosen on the command line
    #[serde(default)]
    pub default_site: Option<String>,

    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

/// Settings for one deployment of the desktop service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL, without a trailing slash
    pub base_url: String,

    pub username: String,

    pub password: String,

    /// Desktop type used when a request does not name one
    pub desktop_type: DesktopType,

    /// Seconds between completion polls
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,

    /// Number of completion polls before handing back to the caller
    #[serde(default = "default_poll_retries")]
    pub poll_retries: u32,

    /// Log in through the federated (Keycloak) form rather than the classic one
    #[serde(default = "default_use_oidc")]
    pub use_oidc: bool,

    #[serde(default = "default_keycloak_login_title")]
    pub keycloak_login_title: String,

    #[serde(default = "default_classic_login_title")]
    pub classic_login_title: String,

    #[serde(default = "default_admin_title")]
    pub admin_title: String,

    #[serde(default = "default_home_title")]
    pub home_title: String,

    /// Passive-check reporting endpoint
    #[serde(default)]
    pub nagios: Option<NagiosSettings>,

    /// Backend database, for clearing error records
    #[serde(default)]
    pub database: Option<DatabaseSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NagiosSettings {
    /// Host the check results are filed against
    pub target_host: String,
    /// NRDP endpoint URL
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_name")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_db_name")]
    pub database: String,

    /// Application username of the test account whose records are repaired
    pub account: String,
}

fn default_poll_seconds() -> u64 {
    5
}

fn default_poll_retries() -> u32 {
    50
}

fn default_use_oidc() -> bool {
    true
}

fn default_keycloak_login_title() -> String {
    "Sign in to Bumblebee".to_string()
}

fn default_classic_login_title() -> String {
    "Log in | Bumblebee".to_string()
}

fn default_admin_title() -> String {
    "Site administration | Bumblebee".to_string()
}

fn default_home_title() -> String {
    "Home | Bumblebee".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_db_name() -> String {
    "bumblebee".to_string()
}

impl SiteConfig {
    /// Minimal site with defaults for everything optional.
    pub fn new(base_url: impl Into<String>, desktop_type: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: String::new(),
            password: String::new(),
            desktop_type: DesktopType::new(desktop_type),
            poll_seconds: default_poll_seconds(),
            poll_retries: default_poll_retries(),
            use_oidc: default_use_oidc(),
            keycloak_login_title: default_keycloak_login_title(),
            classic_login_title: default_classic_login_title(),
            admin_title: default_admin_title(),
            home_title: default_home_title(),
            nagios: None,
            database: None,
        }
    }

    pub fn home_url(&self) -> String {
        format!("{}/home/", self.base_url.trim_end_matches('/'))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds)
    }

    /// Whether `title` is one of the login pages.
    pub fn is_login_title(&self, title: &str) -> bool {
        title == self.keycloak_login_title || title == self.classic_login_title
    }
}

impl ConfigFile {
    /// Default location: `~/.deskprobe.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".deskprobe.toml")
    }

    pub fn from_toml(content: &str) -> DriverResult<Self> {
        toml::from_str(content).map_err(DriverError::from)
    }

    pub fn load(path: &Path) -> DriverResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DriverError::Config(format!("Cannot read the config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Resolve the site to use: the explicit choice, or the default site.
    pub fn site(&self, requested: Option<&str>) -> DriverResult<(String, SiteConfig)> {
        let name = requested
            .map(str::to_string)
            .or_else(|| self.default_site.clone())
            .ok_or_else(|| {
                DriverError::Config(
                    "We need a --site option or a default_site in the config file".to_string(),
                )
            })?;
        let site = self.sites.get(&name).cloned().ok_or_else(|| {
            DriverError::Config(format!("There is no section for site '{}' in the config file", name))
        })?;
        Ok((name, site))
    }
}
