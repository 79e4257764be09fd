//! Page markers and control locators of the desktop web service
//!
//! Everything the driver knows about the service's markup lives here.

use crate::browser::Locator;
use crate::state::{DesktopType, State, Zone};

/// State markers in priority order. The first one present on the home page
/// decides the state, so boosted must stay ahead of plain running.
pub const STATE_MARKERS: &[(&str, State)] = &[
    (
        r#"//small[contains(text(), "Your boosted desktop")]"#,
        State::DesktopSupersized,
    ),
    (
        r#"//h3[contains(text(), "Your Virtual Desktop is")]"#,
        State::DesktopExists,
    ),
    (
        r#"//h3[contains(text(), "Your Desktop is currently shelved")]"#,
        State::DesktopShelved,
    ),
    (
        r#"//p[contains(text(), "Virtual Desktop Error")]"#,
        State::DesktopFailed,
    ),
    (r#"//p[contains(text(), "worker is busy")]"#, State::WorkflowRunning),
    (
        r#"//h4[contains(text(), "You haven't created a Desktop")]"#,
        State::NoDesktop,
    ),
    (
        r#"//h1[contains(text(), "Terms of Service")]"#,
        State::TermsOfServicePending,
    ),
    (
        r#"//a[contains(@title, "Create Project")]"#,
        State::CreateWorkspacePending,
    ),
];

pub const WORKER_BUSY: &str = r#"//p[contains(text(), "worker is busy")]"#;
pub const CURRENT_DESKTOP: &str = r#"//div[starts-with(@id, "researcher_desktop")]"#;
pub const PROGRESS_MESSAGE_ID: &str = "progress-bar-message";
pub const PROGRESS_VALUE_ATTR: &str = "aria-valuenow";

pub const DEFAULT_SIZE: &str = r#"//h6[text()="DEFAULT SIZE"]"#;
pub const BOOST_SIZE: &str = r#"//h6[text()="BOOST SIZE"]"#;
pub const CREATE_DESKTOP_BUTTON: &str = r#"//button[contains(text(), "Create Desktop")]"#;
pub const PAGE_NOT_FOUND: &str =
    r#"//h1[contains(text(), "Page Not Found") or contains(text(), "Page not found")]"#;
pub const LAUNCH_BLOCKED_TOOLTIP: &str = "//span[@data-bs-content]";
pub const CREATE_SUBMIT: &str = r#"//button[text()="Create"]"#;

pub const AGREE_TERMS_BUTTON: &str = r#"//button[text()="I agree to the above Terms of Service."]"#;
pub const CREATE_PROJECT_LINK: &str = r#"//a[contains(@title, "Create Project")]"#;
pub const PROJECT_SUBMIT: &str = "//input[@value='Submit']";

/// Prefix of the id attribute carried by the current desktop's panel.
const DESKTOP_ID_PREFIX: &str = "researcher_desktop";

pub fn state_markers() -> impl Iterator<Item = (Locator, State)> {
    STATE_MARKERS
        .iter()
        .map(|(expr, state)| (Locator::xpath(*expr), *state))
}

pub fn worker_busy() -> Locator {
    Locator::xpath(WORKER_BUSY)
}

pub fn current_desktop() -> Locator {
    Locator::xpath(CURRENT_DESKTOP)
}

/// Desktop type encoded in a `researcher_desktop-<type>` panel id.
pub fn desktop_type_from_id(id: &str) -> Option<DesktopType> {
    let rest = id.strip_prefix(DESKTOP_ID_PREFIX)?.strip_prefix('-')?;
    let name = rest.split('-').next()?;
    if name.is_empty() {
        None
    } else {
        Some(DesktopType::new(name))
    }
}

pub fn progress_bar(desktop: &DesktopType) -> Locator {
    Locator::id(format!("{}-{}-bar", DESKTOP_ID_PREFIX, desktop))
}

pub fn progress_message() -> Locator {
    Locator::id(PROGRESS_MESSAGE_ID)
}

/// Button that opens the command modal for `verb`.
pub fn modal_opener(desktop: &DesktopType, verb: &str) -> Locator {
    Locator::xpath(format!(
        r##"//button[@data-bs-target="#{}"]"##,
        modal_id(desktop, verb)
    ))
}

/// Confirm button labelled `label` inside the command modal for `verb`.
pub fn modal_confirm(desktop: &DesktopType, verb: &str, label: &str) -> Locator {
    Locator::xpath(format!(
        r#"//div[@id="{}"]//button[text()="{}"]"#,
        modal_id(desktop, verb),
        label
    ))
}

fn modal_id(desktop: &DesktopType, verb: &str) -> String {
    format!("{}-{}-{}-modal", DESKTOP_ID_PREFIX, desktop, verb)
}

/// `<select>` shown when several zones are available.
pub fn zone_select(desktop: &DesktopType) -> Locator {
    Locator::id(format!("researcher_workspace-{}-zone", desktop))
}

/// Element shown when exactly one zone is available.
pub fn fixed_zone(desktop: &DesktopType, zone: &Zone) -> Locator {
    Locator::id(format!("researcher_workspace-{}-{}", desktop, zone))
}

/// Any single-zone element for the desktop type, whatever the zone.
pub fn any_fixed_zone(desktop: &DesktopType) -> Locator {
    Locator::xpath(format!(
        r#"//*[starts-with(@id, "researcher_workspace-{d}-") and @id != "researcher_workspace-{d}-zone"]"#,
        d = desktop
    ))
}

/// The option a zone select submits if left alone: the one marked
/// `selected`, else the first.
pub fn preselected_zone(desktop: &DesktopType) -> Locator {
    Locator::xpath(format!(
        r#"(//select[@id="researcher_workspace-{}-zone"]/option[@selected or position()=1])[last()]"#,
        desktop
    ))
}

/// Inputs of the new-workspace form with the values submitted for a test user.
pub const WORKSPACE_FORM: &[(&str, &str)] = &[
    ("id_FoR_code2", "31"),
    ("id_FoR_code", "30"),
    ("id_title", "Test project"),
    ("id_description", "Sample project description"),
    ("id_chief_investigator", "nobody@example.org"),
];
