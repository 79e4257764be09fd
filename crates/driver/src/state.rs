//! Desktop state vocabulary and the lifecycle transition table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable state of the user's desktop, as inferred from the home page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    NoDesktop,
    DesktopExists,
    DesktopShelved,
    DesktopSupersized,
    DesktopFailed,
    WorkflowRunning,
    NotLoggedIn,
    TermsOfServicePending,
    CreateWorkspacePending,
    Unknown,
}

impl State {
    /// Human-readable description, embedded verbatim in errors and status output.
    pub const fn description(self) -> &'static str {
        match self {
            State::DesktopExists => "There is a running desktop",
            State::DesktopShelved => "There is a shelved desktop",
            State::DesktopSupersized => "There is a boosted desktop",
            State::NoDesktop => "There is no desktop",
            State::DesktopFailed => "There is a desktop in failed state",
            State::WorkflowRunning => "There is a desktop workflow running",
            State::NotLoggedIn => "Not logged in",
            State::TermsOfServicePending => "Showing 'terms of service' page",
            State::CreateWorkspacePending => "Showing 'create workspace' page",
            State::Unknown => "State unknown",
        }
    }

    /// True when the home page shows a desktop whose type can be read.
    pub const fn has_desktop(self) -> bool {
        matches!(
            self,
            State::DesktopExists
                | State::DesktopShelved
                | State::DesktopSupersized
                | State::DesktopFailed
                | State::WorkflowRunning
        )
    }

    /// True when a desktop is present and can be deleted to reach `NoDesktop`.
    pub const fn is_deletable(self) -> bool {
        Action::Delete.accepts(self)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Identifier of a class of virtual desktop (e.g. `ubuntu`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesktopType(String);

impl DesktopType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DesktopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DesktopType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of an availability zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(String);

impl Zone {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Zone {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A user-facing lifecycle action.
///
/// The associated tables are the executor's guard table and the scenario
/// engine's planning contract:
///
/// ```text
/// launch           NoDesktop                               -> DesktopExists
/// delete           Exists | Failed | Supersized | Shelved  -> NoDesktop
/// boost            Exists                                  -> Supersized
/// downsize         Supersized                              -> Exists
/// shelve           Exists | Supersized                     -> Shelved
/// unshelve         Shelved                                 -> Exists
/// reboot           Exists | Supersized                     -> entry state
/// agree_terms      TermsOfServicePending                   -> CreateWorkspacePending | NoDesktop
/// create_workspace CreateWorkspacePending                  -> NoDesktop
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Launch,
    Delete,
    Boost,
    Downsize,
    Shelve,
    Unshelve,
    Reboot { hard: bool },
    AgreeTerms,
    CreateWorkspace,
}

impl Action {
    /// States from which this action may be started.
    pub const fn accepted_sources(self) -> &'static [State] {
        match self {
            Action::Launch => &[State::NoDesktop],
            Action::Delete => &[
                State::DesktopExists,
                State::DesktopFailed,
                State::DesktopSupersized,
                State::DesktopShelved,
            ],
            Action::Boost => &[State::DesktopExists],
            Action::Downsize => &[State::DesktopSupersized],
            Action::Shelve | Action::Reboot { .. } => {
                &[State::DesktopExists, State::DesktopSupersized]
            }
            Action::Unshelve => &[State::DesktopShelved],
            Action::AgreeTerms => &[State::TermsOfServicePending],
            Action::CreateWorkspace => &[State::CreateWorkspacePending],
        }
    }

    pub const fn accepts(self, state: State) -> bool {
        let sources = self.accepted_sources();
        let mut i = 0;
        while i < sources.len() {
            if sources[i] as u8 == state as u8 {
                return true;
            }
            i += 1;
        }
        false
    }

    /// States that count as successful completion, given the entry state.
    pub const fn terminal_states(self, entry: State) -> &'static [State] {
        match self {
            Action::Launch | Action::Downsize | Action::Unshelve => &[State::DesktopExists],
            Action::Delete | Action::CreateWorkspace => &[State::NoDesktop],
            Action::Boost => &[State::DesktopSupersized],
            Action::Shelve => &[State::DesktopShelved],
            Action::Reboot { .. } => match entry {
                State::DesktopSupersized => &[State::DesktopSupersized],
                _ => &[State::DesktopExists],
            },
            Action::AgreeTerms => &[State::CreateWorkspacePending, State::NoDesktop],
        }
    }

    /// Whether the action starts backend work that must be polled out.
    pub const fn triggers_workflow(self) -> bool {
        matches!(
            self,
            Action::Launch
                | Action::Boost
                | Action::Downsize
                | Action::Shelve
                | Action::Unshelve
                | Action::Reboot { .. }
        )
    }

    /// Modal verb and confirm-button label for actions driven through a
    /// desktop's command modal.
    pub const fn modal_command(self) -> Option<(&'static str, &'static str)> {
        match self {
            Action::Delete => Some(("delete", "Delete")),
            Action::Boost => Some(("supersize", "Boost")),
            Action::Downsize => Some(("downsize", "Downsize")),
            Action::Shelve => Some(("shelve", "Shelve")),
            Action::Unshelve => Some(("unshelve", "Unshelve")),
            Action::Reboot { hard: true } => Some(("reboot", "Hard Reboot")),
            Action::Reboot { hard: false } => Some(("reboot", "Soft Reboot")),
            Action::Launch | Action::AgreeTerms | Action::CreateWorkspace => None,
        }
    }

    /// Label used when timing the action.
    pub const fn description(self) -> &'static str {
        match self {
            Action::Launch => "Launch Desktop",
            Action::Delete => "Delete Desktop",
            Action::Boost => "Boost Desktop",
            Action::Downsize => "Downsize Desktop",
            Action::Shelve => "Shelve Desktop",
            Action::Unshelve => "Unshelve Desktop",
            Action::Reboot { .. } => "Reboot Desktop",
            Action::AgreeTerms => "Agree to Terms of Service",
            Action::CreateWorkspace => "Create Workspace",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Launch => write!(f, "launch"),
            Action::Delete => write!(f, "delete"),
            Action::Boost => write!(f, "boost"),
            Action::Downsize => write!(f, "downsize"),
            Action::Shelve => write!(f, "shelve"),
            Action::Unshelve => write!(f, "unshelve"),
            Action::Reboot { hard: true } => write!(f, "reboot (hard)"),
            Action::Reboot { hard: false } => write!(f, "reboot"),
            Action::AgreeTerms => write!(f, "agree-terms"),
            Action::CreateWorkspace => write!(f, "create-workspace"),
        }
    }
}
