//! Per-invocation request passed into each transition

use crate::config::SiteConfig;
use crate::state::{DesktopType, Zone};

/// Immutable description of what a transition should do.
///
/// Built once from the command line; scenarios derive modified copies
/// rather than mutating a shared value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRequest {
    /// Desktop type to launch; the site's default when `None`
    pub desktop_type: Option<DesktopType>,

    /// Availability zone to launch in; the service's choice when `None`
    pub zone: Option<Zone>,

    /// Hard rather than soft reboot
    pub hard: bool,

    /// Report completion-poll progress while waiting
    pub show_progress: bool,
}

impl ActionRequest {
    pub fn with_hard(self, hard: bool) -> Self {
        Self { hard, ..self }
    }

    pub fn with_desktop_type(self, desktop_type: DesktopType) -> Self {
        Self {
            desktop_type: Some(desktop_type),
            ..self
        }
    }

    pub fn with_zone(self, zone: Zone) -> Self {
        Self {
            zone: Some(zone),
            ..self
        }
    }

    /// The desktop type this request targets on `site`.
    pub fn desktop_type_for(&self, site: &SiteConfig) -> DesktopType {
        self.desktop_type
            .clone()
            .unwrap_or_else(|| site.desktop_type.clone())
    }
}
