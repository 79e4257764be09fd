//! Database repair for the test account
//!
//! Failed runs can leave error records behind in the service's database that
//! keep the account stuck in `DesktopFailed`. This clears them by driving the
//! `mysql` client: the password travels in `MYSQL_PWD`, never on the command
//! line.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use deskprobe_driver::config::DatabaseSettings;

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mysql exited with {status}: {stderr}")]
    Query { status: String, stderr: String },

    #[error("Cannot find user {0}")]
    UnknownUser(String),

    #[error("Unexpected mysql output: {0:?}")]
    BadOutput(String),
}

/// Outstanding error records for the test account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorCounts {
    pub vmstatus_errors: u64,
    pub resource_errors: u64,
}

impl ErrorCounts {
    pub fn any(&self) -> bool {
        self.vmstatus_errors > 0 || self.resource_errors > 0
    }
}

impl fmt::Display for ErrorCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} VMStatus error(s), {} cloud resource error(s)",
            self.vmstatus_errors, self.resource_errors
        )
    }
}

pub struct DbRepairer {
    settings: DatabaseSettings,
    program: PathBuf,
    user_id: u64,
}

impl DbRepairer {
    /// Look up the test account with the `mysql` found on `PATH`.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, RepairError> {
        Self::with_program(settings, Path::new("mysql")).await
    }

    pub async fn with_program(settings: &DatabaseSettings, program: &Path) -> Result<Self, RepairError> {
        let mut repairer = Self {
            settings: settings.clone(),
            program: program.to_path_buf(),
            user_id: 0,
        };
        let output = repairer.run(&user_id_sql(&settings.account)).await?;
        repairer.user_id = parse_user_id(&output)?
            .ok_or_else(|| RepairError::UnknownUser(settings.account.clone()))?;
        debug!("Account '{}' has user id {}", settings.account, repairer.user_id);
        Ok(repairer)
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub async fn error_counts(&self) -> Result<ErrorCounts, RepairError> {
        let output = self.run(&error_counts_sql(self.user_id)).await?;
        parse_counts(&output)
    }

    /// Set error (and stale OK) VMStatus records to `No_VM` and mark flagged
    /// cloud resources deleted, all in one transaction.
    pub async fn clear_errors(&self) -> Result<(), RepairError> {
        self.run(&clear_errors_sql(self.user_id)).await.map(|_| ())
    }

    async fn run(&self, sql: &str) -> Result<String, RepairError> {
        debug!("SQL: {}", sql);
        let output = Command::new(&self.program)
            .args(["--batch", "--skip-column-names"])
            .arg("--host")
            .arg(&self.settings.host)
            .arg("--port")
            .arg(self.settings.port.to_string())
            .arg("--user")
            .arg(&self.settings.username)
            .arg("--execute")
            .arg(sql)
            .arg(&self.settings.database)
            .env("MYSQL_PWD", &self.settings.password)
            .output()
            .await
            .map_err(|source| RepairError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(RepairError::Query {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// SQL string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn user_id_sql(username: &str) -> String {
    format!(
        "SELECT id FROM researcher_workspace_user WHERE username = {}",
        quote(username)
    )
}

fn error_counts_sql(user_id: u64) -> String {
    format!(
        "SELECT \
         (SELECT count(id) FROM vm_manager_vmstatus \
         WHERE status = 'VM_Error' AND user_id = {id}), \
         (SELECT count(id) FROM vm_manager_cloudresource \
         WHERE error_flag IS NOT NULL AND deleted IS NULL AND user_id = {id})",
        id = user_id
    )
}

fn clear_errors_sql(user_id: u64) -> String {
    format!(
        "START TRANSACTION; \
         UPDATE vm_manager_vmstatus SET status = 'No_VM' \
         WHERE status IN ('VM_Error', 'VM_OK') AND user_id = {id}; \
         UPDATE vm_manager_cloudresource SET deleted = now() \
         WHERE error_flag IS NOT NULL AND deleted IS NULL AND user_id = {id}; \
         COMMIT;",
        id = user_id
    )
}

fn parse_user_id(output: &str) -> Result<Option<u64>, RepairError> {
    match output.lines().map(str::trim).find(|l| !l.is_empty()) {
        None => Ok(None),
        Some(line) => line
            .parse()
            .map(Some)
            .map_err(|_| RepairError::BadOutput(output.to_string())),
    }
}

fn parse_counts(output: &str) -> Result<ErrorCounts, RepairError> {
    let bad = || RepairError::BadOutput(output.to_string());
    let line = output.lines().find(|l| !l.trim().is_empty()).ok_or_else(bad)?;
    let mut fields = line.split('\t').map(|f| f.trim().parse::<u64>());
    match (fields.next(), fields.next(), fields.next()) {
        (Some(Ok(vmstatus_errors)), Some(Ok(resource_errors)), None) => Ok(ErrorCounts {
            vmstatus_errors,
            resource_errors,
        }),
        _ => Err(bad()),
    }
}
