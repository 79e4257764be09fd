//! Database reset for the test account

use anyhow::Result;

use super::{Context, UsageError};
use crate::db::DbRepairer;
use crate::output::{print_info, print_success};

pub async fn execute(force: bool, ctx: &Context) -> Result<()> {
    let settings = ctx
        .site
        .database
        .as_ref()
        .filter(|db| !db.host.is_empty())
        .ok_or_else(|| UsageError::new("Database host is not configured: cannot reset DB"))?;

    let repairer = DbRepairer::connect(settings).await?;
    let errors = repairer.error_counts().await?;
    if errors.any() || force {
        print_info(&format!("Clearing DB errors: {}", errors));
        repairer.clear_errors().await?;
        print_success("DB reset done");
    } else {
        print_info("DB reset skipped: no Volume, Instance or VMStatus records in error state");
    }
    Ok(())
}
