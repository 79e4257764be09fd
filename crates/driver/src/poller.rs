//! Completion poller: wait out backend work triggered by a transition

use std::time::Duration;
use tracing::{debug, info};

use crate::config::SiteConfig;
use crate::error::DriverResult;
use crate::markers;
use crate::session::Session;
use crate::state::DesktopType;

/// Retry budget for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_retries: u32,
    pub interval: Duration,
}

impl PollSettings {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// The site's configured budget.
    pub fn for_site(site: &SiteConfig) -> Self {
        Self::new(site.poll_retries, site.poll_interval())
    }

    /// Upper bound on the time a wait can sleep.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_retries
    }
}

/// Progress reported by the service while a workflow runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Completion percentage, as published by the progress bar
    pub percent: String,
    pub message: String,
}

/// How a wait ended. Exhausting the budget is not a failure: the caller's
/// postcondition check decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { polls: u32 },
    Exhausted { polls: u32 },
}

pub type ProgressCallback<'a> = &'a (dyn Fn(&Progress) + Send + Sync);

impl Session {
    /// Poll until the "worker is busy" marker disappears or the retry budget
    /// runs out.
    ///
    /// Sleeps for at most `settings.budget()`. There is no way to cancel a
    /// wait other than dropping the task.
    pub async fn await_completion(
        &mut self,
        desktop: &DesktopType,
        settings: PollSettings,
        progress: Option<ProgressCallback<'_>>,
    ) -> DriverResult<PollOutcome> {
        let busy = markers::worker_busy();
        let mut retries = 0;

        while retries < settings.max_retries {
            if !self.browser().exists(&busy).await? {
                debug!("Workflow for '{}' finished after {} poll(s)", desktop, retries);
                return Ok(PollOutcome::Completed { polls: retries });
            }

            if let Some(report) = progress {
                if let Some(p) = self.read_progress(desktop).await? {
                    report(&p);
                }
            }

            tokio::time::sleep(settings.interval).await;
            retries += 1;
        }

        info!(
            "Workflow for '{}' still busy after {} poll(s); deferring to postcondition",
            desktop, retries
        );
        Ok(PollOutcome::Exhausted { polls: retries })
    }

    async fn read_progress(&mut self, desktop: &DesktopType) -> DriverResult<Option<Progress>> {
        let percent = self
            .browser()
            .attribute(&markers::progress_bar(desktop), markers::PROGRESS_VALUE_ATTR)
            .await?;
        let message = self.browser().find(&markers::progress_message()).await?;

        Ok(match (percent, message) {
            (Some(percent), Some(message)) => Some(Progress {
                percent,
                message: message.text,
            }),
            _ => None,
        })
    }
}
