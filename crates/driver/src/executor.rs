//! Transition executor: one checked operation per lifecycle action
//!
//! Every transition follows the same template:
//!
//! 1. sense the state and check it is an accepted source for the action
//! 2. drive the UI controls for the action
//! 3. for actions that start backend work, poll until it settles
//! 4. sense again and check the state is an accepted terminal
//!
//! A failed precondition goes through [`Session::diagnose`]; a failed
//! postcondition is [`DriverError::TransitionIncomplete`]. Nothing is retried.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::browser::{ClickOutcome, Locator};
use crate::error::{DriverError, DriverResult};
use crate::markers;
use crate::poller::{PollOutcome, PollSettings, Progress, ProgressCallback};
use crate::request::ActionRequest;
use crate::session::Session;
use crate::state::{Action, DesktopType, State, Zone};

/// Logs the start and the duration of a timed operation.
pub(crate) struct Stopwatch {
    description: String,
    started: Instant,
}

impl Stopwatch {
    pub(crate) fn start(description: impl Into<String>) -> Self {
        let description = description.into();
        info!("Starting {}", description);
        Self {
            description,
            started: Instant::now(),
        }
    }

    pub(crate) fn finish(self) {
        info!(
            "Finished {} in {} ms",
            self.description,
            self.started.elapsed().as_millis()
        );
    }
}

/// Result of the read-only `status` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub state: State,
    pub desktop_type: Option<DesktopType>,
}

pub type SharedProgress = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Executes lifecycle transitions against a borrowed session.
pub struct Executor<'s> {
    session: &'s mut Session,
    poll: PollSettings,
    progress: Option<SharedProgress>,
    journal: Vec<Action>,
}

impl<'s> Executor<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        let poll = PollSettings::for_site(session.site());
        Self {
            session,
            poll,
            progress: None,
            journal: Vec::new(),
        }
    }

    /// Override the site's completion-poll budget.
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Where progress goes when a request asks for it. Without one, progress
    /// is logged.
    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn session(&mut self) -> &mut Session {
        self.session
    }

    /// Actions completed so far, in order.
    pub fn journal(&self) -> &[Action] {
        &self.journal
    }

    pub async fn sense(&mut self) -> DriverResult<State> {
        self.session.sense().await
    }

    /// Current state, plus the desktop type when a desktop is shown.
    ///
    /// A login page or an unrecognised page is an error, not a status.
    pub async fn status(&mut self) -> DriverResult<StatusReport> {
        let watch = Stopwatch::start("Desktop status");
        let state = self.session.sense().await?;
        if matches!(state, State::Unknown | State::NotLoggedIn) {
            return Err(self.session.diagnose().await);
        }
        let desktop_type = if state.has_desktop() {
            Some(self.session.current_desktop_type().await?)
        } else {
            None
        };
        watch.finish();
        Ok(StatusReport {
            state,
            desktop_type,
        })
    }

    pub async fn launch(&mut self, request: &ActionRequest) -> DriverResult<()> {
        let action = Action::Launch;
        let watch = Stopwatch::start(action.description());
        let entry = self.precondition(action).await?;

        let desktop = request.desktop_type_for(self.session.site());
        self.session.open(&format!("desktop/{}", desktop)).await?;
        info!(
            "Launching '{}' desktop in zone '{}'",
            desktop,
            request.zone.as_ref().map(Zone::as_str).unwrap_or("default")
        );

        let opener = Locator::xpath(markers::CREATE_DESKTOP_BUTTON);
        if !self.session.browser().exists(&opener).await? {
            if self
                .session
                .browser()
                .exists(&Locator::xpath(markers::PAGE_NOT_FOUND))
                .await?
            {
                return Err(DriverError::UnknownDesktopType(desktop.to_string()));
            }
            return Err(DriverError::ElementNotFound(opener.to_string()));
        }

        if self.session.browser().click(&opener).await? == ClickOutcome::Intercepted {
            if self
                .session
                .browser()
                .exists(&Locator::xpath(markers::LAUNCH_BLOCKED_TOOLTIP))
                .await?
            {
                return Err(DriverError::DesktopAlreadyExists);
            }
            return Err(DriverError::ClickIntercepted(opener.to_string()));
        }

        self.select_zone(&desktop, request.zone.as_ref()).await?;
        self.click(&Locator::xpath(markers::CREATE_SUBMIT)).await?;

        let landed = self.session.browser().current_url().await?;
        if landed != self.session.home_url() {
            return Err(DriverError::RedirectFailed {
                expected: self.session.home_url().to_string(),
                actual: landed,
            });
        }

        self.wait_for_worker(request).await?;
        self.postcondition(action, entry).await?;
        self.journal.push(action);
        watch.finish();
        Ok(())
    }

    pub async fn delete(&mut self, request: &ActionRequest) -> DriverResult<()> {
        self.modal_transition(Action::Delete, request).await
    }

    pub async fn boost(&mut self, request: &ActionRequest) -> DriverResult<()> {
        self.modal_transition(Action::Boost, request).await
    }

    pub async fn downsize(&mut self, request: &ActionRequest) -> DriverResult<()> {
        self.modal_transition(Action::Downsize, request).await
    }

    pub async fn shelve(&mut self, request: &ActionRequest) -> DriverResult<()> {
        self.modal_transition(Action::Shelve, request).await
    }

    pub async fn unshelve(&mut self, request: &ActionRequest) -> DriverResult<()> {
        self.modal_transition(Action::Unshelve, request).await
    }

    /// Soft or hard reboot, per `request.hard`. The desktop must come back in
    /// the state it was in (running or boosted).
    pub async fn reboot(&mut self, request: &ActionRequest) -> DriverResult<()> {
        self.modal_transition(Action::Reboot { hard: request.hard }, request)
            .await
    }

    /// Accept the terms of service shown to a new user.
    pub async fn agree_terms(&mut self, _request: &ActionRequest) -> DriverResult<()> {
        let action = Action::AgreeTerms;
        let watch = Stopwatch::start(action.description());
        let entry = self.precondition(action).await?;

        self.session.navigate_home().await?;
        self.expect_url(&self.session.site().url("terms/")).await?;
        self.click(&Locator::xpath(markers::AGREE_TERMS_BUTTON)).await?;
        self.session.navigate_home().await?;
        self.expect_url(&self.session.home_url().to_string()).await?;

        self.postcondition(action, entry).await?;
        self.journal.push(action);
        watch.finish();
        Ok(())
    }

    /// Fill in and submit the new-workspace form shown to a new user.
    pub async fn create_workspace(&mut self, _request: &ActionRequest) -> DriverResult<()> {
        let action = Action::CreateWorkspace;
        let watch = Stopwatch::start(action.description());
        let entry = self.precondition(action).await?;

        self.expect_url(&self.session.home_url().to_string()).await?;
        self.click(&Locator::xpath(markers::CREATE_PROJECT_LINK)).await?;
        self.expect_url(&self.session.site().url("new_project")).await?;

        for (id, value) in markers::WORKSPACE_FORM {
            self.session.browser().fill(&Locator::id(*id), value).await?;
        }
        self.click(&Locator::xpath(markers::PROJECT_SUBMIT)).await?;

        self.postcondition(action, entry).await?;
        self.journal.push(action);
        watch.finish();
        Ok(())
    }

    async fn modal_transition(&mut self, action: Action, request: &ActionRequest) -> DriverResult<()> {
        let (verb, label) = action.modal_command().ok_or_else(|| {
            DriverError::Browser(format!("{} has no command modal", action))
        })?;
        let watch = Stopwatch::start(action.description());
        let entry = self.precondition(action).await?;

        let desktop = self.session.current_desktop_type().await?;
        self.click(&markers::modal_opener(&desktop, verb)).await?;
        self.click(&markers::modal_confirm(&desktop, verb, label)).await?;

        if action.triggers_workflow() {
            self.wait_for_worker(request).await?;
        }
        self.postcondition(action, entry).await?;
        self.journal.push(action);
        watch.finish();
        Ok(())
    }

    async fn precondition(&mut self, action: Action) -> DriverResult<State> {
        let state = self.session.sense().await?;
        if action.accepts(state) {
            Ok(state)
        } else {
            Err(self.session.diagnose().await)
        }
    }

    async fn postcondition(&mut self, action: Action, entry: State) -> DriverResult<State> {
        let actual = self.session.sense().await?;
        if action.terminal_states(entry).contains(&actual) {
            Ok(actual)
        } else {
            Err(DriverError::TransitionIncomplete { action, actual })
        }
    }

    async fn wait_for_worker(&mut self, request: &ActionRequest) -> DriverResult<PollOutcome> {
        let desktop = self.session.current_desktop_type().await?;
        let log_progress = |p: &Progress| {
            info!("Progress: {}%, message: '{}'", p.percent, p.message);
        };
        let callback: Option<ProgressCallback<'_>> = if request.show_progress {
            Some(match &self.progress {
                Some(progress) => progress.as_ref(),
                None => &log_progress as ProgressCallback<'_>,
            })
        } else {
            None
        };
        self.session
            .await_completion(&desktop, self.poll, callback)
            .await
    }

    /// Zone selection through whichever affordance the launch form shows: a
    /// `<select>` of several zones, a fixed single zone, or nothing at all.
    async fn select_zone(&mut self, desktop: &DesktopType, zone: Option<&Zone>) -> DriverResult<()> {
        let select = markers::zone_select(desktop);
        let multi = self.session.browser().exists(&select).await?;

        let Some(zone) = zone else {
            if multi {
                let preselected = self.session.preselected_zone(desktop).await?;
                warn!(
                    "No zone requested; launching '{}' in the zone preselected by the service: {}",
                    desktop,
                    preselected.as_ref().map(Zone::as_str).unwrap_or("unknown")
                );
            }
            return Ok(());
        };

        if multi {
            if !self.session.browser().select_option(&select, zone.as_str()).await? {
                return Err(DriverError::ZoneNotUnderstood {
                    zone: zone.to_string(),
                    affordance: "not among the offered zones",
                });
            }
            return Ok(());
        }

        if self
            .session
            .browser()
            .exists(&markers::fixed_zone(desktop, zone))
            .await?
        {
            return Ok(());
        }

        let affordance = if self
            .session
            .browser()
            .exists(&markers::any_fixed_zone(desktop))
            .await?
        {
            "not the only zone offered"
        } else {
            "no zone choice offered"
        };
        Err(DriverError::ZoneNotUnderstood {
            zone: zone.to_string(),
            affordance,
        })
    }

    async fn click(&mut self, locator: &Locator) -> DriverResult<()> {
        match self.session.browser().click(locator).await? {
            ClickOutcome::Clicked => Ok(()),
            ClickOutcome::Intercepted => Err(DriverError::ClickIntercepted(locator.to_string())),
        }
    }

    async fn expect_url(&mut self, expected: &str) -> DriverResult<()> {
        let actual = self.session.browser().current_url().await?;
        if actual == expected {
            Ok(())
        } else {
            Err(DriverError::RedirectFailed {
                expected: expected.to_string(),
                actual,
            })
        }
    }
}
