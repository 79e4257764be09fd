//! deskprobe lifecycle driver
//!
//! This crate drives a virtual desktop web service through a browser and
//! reasons about it purely from what the rendered pages show:
//! - Senses the current desktop state from page markers
//! - Waits out long-running backend work by polling the page
//! - Executes lifecycle transitions with pre/post-condition checks
//! - Composes transitions into named end-to-end scenarios
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Engine (scenario)                 │
//! │    ├── normalize(): delete any leftover desktop             │
//! │    └── basic | lifecycle | newuser | registered plugins     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                Transition Executor (executor)               │
//! │    launch, delete, boost, downsize, shelve, unshelve,       │
//! │    reboot, agree_terms, create_workspace, status            │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   Page Sensor (sensor)       │  Completion Poller (poller)  │
//! │    sense() -> State          │   await_completion()         │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │  Session = BrowserSession (browser / playwright) + Site     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod executor;
pub mod login;
pub mod markers;
pub mod outcome;
pub mod playwright;
pub mod poller;
pub mod request;
pub mod scenario;
pub mod sensor;
pub mod session;
pub mod state;

pub use browser::{BrowserSession, ClickOutcome, Element, Locator};
pub use config::{ConfigFile, SiteConfig};
pub use error::{DriverError, DriverResult};
pub use executor::{Executor, StatusReport};
pub use outcome::{EventReporter, Outcome};
pub use request::ActionRequest;
pub use scenario::{Scenario, ScenarioRegistry};
pub use session::Session;
pub use state::{Action, DesktopType, State, Zone};
