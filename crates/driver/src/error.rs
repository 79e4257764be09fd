//! Error types for the lifecycle driver

use thiserror::Error;

use crate::state::{Action, State};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Desktop in unexpected state: '{0}'")]
    UnexpectedState(State),

    #[error("{action} did not complete: state is '{actual}'")]
    TransitionIncomplete { action: Action, actual: State },

    #[error("Desktop type '{0}' is not recognized by the server")]
    UnknownDesktopType(String),

    #[error("User already has a desktop")]
    DesktopAlreadyExists,

    #[error("Zone '{zone}' not understood ({affordance})")]
    ZoneNotUnderstood { zone: String, affordance: &'static str },

    #[error("Didn't redirect to {expected} (landed on {actual})")]
    RedirectFailed { expected: String, actual: String },

    #[error("Reset failed: state is '{0}'")]
    ResetFailed(State),

    #[error("There is no current desktop")]
    NoCurrentDesktop,

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Click intercepted on {0}")]
    ClickIntercepted(String),

    #[error("Scenario '{0}' not found")]
    ScenarioNotFound(String),

    #[error("Invalid arguments for scenario '{scenario}': {reason}")]
    ScenarioArgs { scenario: String, reason: String },

    #[error("Cannot run 'newuser' scenario for {user}: {step} already done?")]
    OnboardingAlreadyDone { user: String, step: &'static str },

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DriverError {
    /// The observed state carried by state-related failures, if any.
    pub fn observed_state(&self) -> Option<State> {
        match self {
            DriverError::UnexpectedState(state) | DriverError::ResetFailed(state) => Some(*state),
            DriverError::TransitionIncomplete { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
