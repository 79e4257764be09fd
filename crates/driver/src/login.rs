//! Login flows
//!
//! The service either fronts its home page with a federated (Keycloak) login
//! or with its own username/password form. Which one to expect is a site
//! setting; landing on the other one means the server is configured
//! differently from what the site config says.

use tracing::info;

use crate::browser::{BrowserSession, ClickOutcome, Locator};
use crate::error::{DriverError, DriverResult};
use crate::session::Session;
use crate::state::State;

/// Credentials used to log in.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Oidc,
    Classic,
}

impl LoginMode {
    pub fn for_site(use_oidc: bool) -> Self {
        if use_oidc {
            LoginMode::Oidc
        } else {
            LoginMode::Classic
        }
    }
}

/// Outcome of a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    LoggedIn,
    AlreadyLoggedIn,
}

/// Log the session in with the mode configured for its site.
pub async fn login(session: &mut Session, credentials: &Credentials) -> DriverResult<LoginStatus> {
    match LoginMode::for_site(session.site().use_oidc) {
        LoginMode::Oidc => oidc_login(session, credentials).await,
        LoginMode::Classic => classic_login(session, credentials).await,
    }
}

async fn classic_login(session: &mut Session, credentials: &Credentials) -> DriverResult<LoginStatus> {
    info!("Logging in (classic)");
    session.navigate_home().await?;
    let title = session.browser().title().await?;
    let site = session.site().clone();

    if title == site.keycloak_login_title {
        return Err(DriverError::LoginFailed(
            "Got the Keycloak login page: is the server's OIDC setting wrong?".to_string(),
        ));
    }
    if title == site.home_title {
        info!("Already logged in");
        return Ok(LoginStatus::AlreadyLoggedIn);
    }
    if title != site.classic_login_title {
        return Err(DriverError::LoginFailed(format!(
            "Unexpected title for home page: '{}'",
            title
        )));
    }

    let browser = session.browser();
    browser
        .fill(&form_field("login-form", "id_username"), &credentials.username)
        .await?;
    browser
        .fill(&form_field("login-form", "id_password"), &credentials.password)
        .await?;
    submit(
        browser,
        &Locator::xpath(r#"//form[@id="login-form"]//input[@type="submit"]"#),
    )
    .await?;

    if session.browser().title().await? == site.admin_title {
        // Staff accounts land on the admin site.
        session.navigate_home().await?;
    }
    let title = session.browser().title().await?;
    if title == site.home_title {
        info!("Logged in!");
        Ok(LoginStatus::LoggedIn)
    } else {
        Err(DriverError::LoginFailed(format!(
            "Login sequence didn't work: expected '{}', got '{}'",
            site.home_title, title
        )))
    }
}

async fn oidc_login(session: &mut Session, credentials: &Credentials) -> DriverResult<LoginStatus> {
    info!("Logging in (oidc)");
    session.navigate_home().await?;
    let title = session.browser().title().await?;
    let site = session.site().clone();

    if title == site.classic_login_title {
        return Err(DriverError::LoginFailed(
            "Didn't get the Keycloak login page: is the server's OIDC setting wrong?".to_string(),
        ));
    }
    if title == site.home_title {
        info!("Already logged in");
        return Ok(LoginStatus::AlreadyLoggedIn);
    }
    if title != site.keycloak_login_title {
        return Err(DriverError::LoginFailed(format!(
            "Unexpected title for home page: '{}'",
            title
        )));
    }

    let browser = session.browser();
    // The username/password form may be hidden behind identity-provider buttons.
    browser.reveal(&Locator::id("kc-form-login")).await?;
    browser
        .fill(&form_field("kc-form-login", "username"), &credentials.username)
        .await?;
    browser
        .fill(&form_field("kc-form-login", "password"), &credentials.password)
        .await?;
    submit(browser, &form_field("kc-form-login", "kc-login")).await?;

    let state = session.sense().await?;
    // A new user lands on the terms of service, which still counts as logged in.
    if matches!(state, State::NotLoggedIn | State::Unknown) {
        return Err(DriverError::LoginFailed(format!(
            "Login sequence didn't work: state is '{}'",
            state
        )));
    }
    Ok(LoginStatus::LoggedIn)
}

fn form_field(form: &str, id: &str) -> Locator {
    Locator::xpath(format!(r#"//form[@id="{}"]//*[@id="{}"]"#, form, id))
}

async fn submit(
    browser: &mut (dyn BrowserSession + 'static),
    button: &Locator,
) -> DriverResult<()> {
    match browser.click(button).await? {
        ClickOutcome::Clicked => Ok(()),
        ClickOutcome::Intercepted => Err(DriverError::ClickIntercepted(button.to_string())),
    }
}
