//! An authenticated browser context bound to one site

use tracing::debug;

use crate::browser::BrowserSession;
use crate::config::SiteConfig;
use crate::error::DriverResult;

/// Browser plus the site it is driving.
///
/// A session owns the lifecycle of exactly one desktop (the service allows one
/// per user). It is taken by `&mut` everywhere, so only one transition can be
/// in flight at a time.
pub struct Session {
    browser: Box<dyn BrowserSession>,
    site: SiteConfig,
    home_url: String,
}

impl Session {
    pub fn new(browser: Box<dyn BrowserSession>, site: SiteConfig) -> Self {
        let home_url = site.home_url();
        Self {
            browser,
            site,
            home_url,
        }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn home_url(&self) -> &str {
        &self.home_url
    }

    pub fn browser(&mut self) -> &mut (dyn BrowserSession + 'static) {
        self.browser.as_mut()
    }

    /// Whether the home view is what is currently rendered.
    pub async fn on_home(&mut self) -> DriverResult<bool> {
        Ok(self.browser.current_url().await? == self.home_url)
    }

    /// Load the home view unconditionally.
    pub async fn navigate_home(&mut self) -> DriverResult<()> {
        let home = self.home_url.clone();
        self.browser.goto(&home).await
    }

    /// Load the home view unless it is already showing. Reloading would lose
    /// interim UI state such as a running progress bar.
    pub async fn ensure_home(&mut self) -> DriverResult<()> {
        if !self.on_home().await? {
            debug!("Navigating to {}", self.home_url);
            self.navigate_home().await?;
        }
        Ok(())
    }

    /// Navigate to a path below the site's base URL.
    pub async fn open(&mut self, path: &str) -> DriverResult<()> {
        let url = self.site.url(path);
        debug!("Navigating to {}", url);
        self.browser.goto(&url).await
    }

    pub async fn close(mut self) -> DriverResult<()> {
        self.browser.close().await
    }
}
