//! Commands that drive the desktop service through a browser

use anyhow::{bail, Result};
use tracing::{info, warn};

use deskprobe_driver::login::{login, Credentials, LoginStatus};
use deskprobe_driver::playwright::PlaywrightSession;
use deskprobe_driver::scenario::run_scenario;
use deskprobe_driver::{Executor, ScenarioRegistry, Session};

use super::{Commands, Context};
use crate::output::{self, print_info, print_item, print_success, StatusDisplay};

pub async fn execute(command: &Commands, ctx: &Context) -> Result<()> {
    let browser = PlaywrightSession::launch(&ctx.playwright).await?;
    let mut session = Session::new(Box::new(browser), ctx.site.clone());

    let result = drive(&mut session, command, ctx).await;

    // Don't leak browser processes, whatever happened.
    if let Err(e) = session.close().await {
        warn!("Failed to close the browser: {}", e);
    }
    result
}

async fn drive(session: &mut Session, command: &Commands, ctx: &Context) -> Result<()> {
    let credentials = Credentials::new(&ctx.site.username, &ctx.site.password);
    if login(session, &credentials).await? == LoginStatus::AlreadyLoggedIn {
        print_info("Already logged in");
    }

    let mut executor = Executor::new(session);
    if ctx.request.show_progress {
        executor = executor.with_progress(output::progress_bar());
    }
    let request = &ctx.request;
    let desktop = request.desktop_type_for(&ctx.site);

    match command {
        Commands::Status => {
            let report = executor.status().await?;
            print_item(&StatusDisplay::new(&ctx.site_name, &report), ctx.format);
        }
        Commands::Launch => {
            executor.launch(request).await?;
            print_success(&format!("Launched '{}' desktop", desktop));
        }
        Commands::Delete => {
            executor.delete(request).await?;
            print_success("Deleted desktop");
        }
        Commands::Boost => {
            executor.boost(request).await?;
            print_success("Boosted desktop");
        }
        Commands::Downsize => {
            executor.downsize(request).await?;
            print_success("Downsized desktop");
        }
        Commands::Shelve => {
            executor.shelve(request).await?;
            print_success("Shelved desktop");
        }
        Commands::Unshelve => {
            executor.unshelve(request).await?;
            print_success("Unshelved desktop");
        }
        Commands::Reboot { hard } => {
            executor.reboot(&request.clone().with_hard(*hard)).await?;
            print_success(if *hard {
                "Hard rebooted desktop"
            } else {
                "Soft rebooted desktop"
            });
        }
        Commands::Scenario { name, args } => {
            let registry = ScenarioRegistry::builtin();
            run_scenario(&registry, name, args, &mut executor, request).await?;
            info!("Actions: {:?}", executor.journal());
            print_success(&format!("Scenario '{}' passed", name));
        }
        Commands::Reset { .. } => bail!("reset does not use the browser"),
    }
    Ok(())
}
