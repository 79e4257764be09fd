//! Page sensor: infer the desktop state from the home page

use tracing::{debug, warn};

use crate::browser::Locator;
use crate::error::{DriverError, DriverResult};
use crate::markers;
use crate::session::Session;
use crate::state::{DesktopType, State, Zone};

impl Session {
    /// Figure out the current state of the user's desktop.
    ///
    /// Loads the home view if it is not already showing. The login-page title
    /// is checked before any marker; after that the first marker present in
    /// [`markers::STATE_MARKERS`] wins. An unrecognised page is `Unknown`, and
    /// its markup is logged so the cause can be found.
    pub async fn sense(&mut self) -> DriverResult<State> {
        self.ensure_home().await?;

        let title = self.browser().title().await?;
        if self.site().is_login_title(&title) {
            return Ok(State::NotLoggedIn);
        }

        for (locator, state) in markers::state_markers() {
            if self.browser().exists(&locator).await? {
                debug!("Sensed '{}' via {}", state, locator);
                return Ok(state);
            }
        }

        let source = self.browser().page_source().await?;
        warn!("Home page matches no known marker (title '{}')", title);
        debug!("Page body for unknown state:\n{}", source);
        Ok(State::Unknown)
    }

    /// Desktop type of the desktop shown on the home page.
    pub async fn current_desktop_type(&mut self) -> DriverResult<DesktopType> {
        self.ensure_home().await?;

        let id = match self.browser().find(&markers::current_desktop()).await? {
            Some(element) => element.id,
            None => return Err(DriverError::NoCurrentDesktop),
        };
        id.as_deref()
            .and_then(markers::desktop_type_from_id)
            .ok_or(DriverError::NoCurrentDesktop)
    }

    /// Zone the launch form's zone select would submit untouched, if it shows one.
    pub async fn preselected_zone(&mut self, desktop_type: &DesktopType) -> DriverResult<Option<Zone>> {
        Ok(self
            .browser()
            .attribute(&markers::preselected_zone(desktop_type), "value")
            .await?
            .map(Zone::new))
    }

    /// Whether `desktop_type` exists on the service and offers a boost size.
    ///
    /// Leaves the browser on the type's detail page.
    pub async fn is_boostable(&mut self, desktop_type: &DesktopType) -> DriverResult<bool> {
        self.open(&format!("desktop/{}", desktop_type)).await?;

        if !self.browser().exists(&Locator::xpath(markers::DEFAULT_SIZE)).await? {
            return Err(DriverError::UnknownDesktopType(desktop_type.to_string()));
        }
        self.browser().exists(&Locator::xpath(markers::BOOST_SIZE)).await
    }

    /// Shared failure path: re-sense and report the state verbatim.
    pub async fn diagnose(&mut self) -> DriverError {
        match self.sense().await {
            Ok(state) => DriverError::UnexpectedState(state),
            Err(e) => e,
        }
    }
}
