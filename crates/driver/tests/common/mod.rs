//! In-memory stand-in for the desktop web service, seen through a browser
//!
//! `FakeService` models just enough of the service for the driver to run
//! against it: pages keyed by URL, the markers and controls each page shows,
//! and the backend effect of each control. Tests keep a handle to inspect
//! (and tamper with) the service while the session owns the browser.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use deskprobe_driver::browser::{BrowserSession, ClickOutcome, Element, Locator};
use deskprobe_driver::markers;
use deskprobe_driver::{DesktopType, DriverError, DriverResult, Session, SiteConfig, State, Zone};

pub const BASE_URL: &str = "https://desktops.example.org";
pub const KEYCLOAK_URL: &str = "https://keycloak.example.org/auth/realms/desktops";
pub const USERNAME: &str = "probe";
pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Supersized,
    Shelved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desktop {
    pub desktop_type: DesktopType,
    pub status: Status,
    pub zone: Option<Zone>,
}

/// How the launch form offers availability zones.
#[derive(Debug, Clone)]
pub enum Zones {
    Hidden,
    Fixed(Zone),
    Choice(Vec<Zone>),
}

#[derive(Debug, Clone)]
pub struct Offer {
    pub boostable: bool,
    pub zones: Zones,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Control {
    Inert,
    OpenLaunch,
    SubmitLaunch(DesktopType),
    OpenModal(String),
    Confirm(String, String),
    AgreeTerms,
    OpenNewProject,
    SubmitProject,
    ClassicLogin,
    KeycloakLogin,
}

struct Node {
    locator: Locator,
    element: Element,
    control: Control,
}

impl Node {
    fn marker(locator: Locator) -> Self {
        Self {
            locator,
            element: Element::default(),
            control: Control::Inert,
        }
    }

    fn control(locator: Locator, control: Control) -> Self {
        Self {
            locator,
            element: Element::default(),
            control,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Page {
    Home,
    Terms,
    Detail(String),
    NewProject,
    ClassicLogin,
    KeycloakLogin,
    Admin,
    Other,
}

/// Mutable state of the fake service.
pub struct Service {
    pub site: SiteConfig,
    pub url: String,
    pub logged_in: bool,
    pub staff: bool,
    pub terms_pending: bool,
    pub workspace_pending: bool,
    pub offers: BTreeMap<String, Offer>,
    pub desktop: Option<Desktop>,
    /// Busy polls each backend workflow takes
    pub workflow_polls: u32,
    /// Busy polls left for the running workflow
    pub busy: u32,
    /// The running workflow never finishes
    pub hang: bool,
    /// The next command for this modal verb leaves the desktop in error
    pub break_next: Option<&'static str>,
    /// The service refuses new desktops even though none is shown
    pub launch_blocked: bool,
    /// Submitting the launch form stays on the detail page
    pub skip_redirect: bool,
    /// The home page shows none of the known markers
    pub garbled_home: bool,
    pub open_modal: Option<String>,
    pub login_form_revealed: bool,
    pub fields: BTreeMap<String, String>,
    pub selected_zone: Option<Zone>,
    /// Backend commands issued, in order
    pub commands: Vec<String>,
    pub closed: bool,
}

impl Service {
    fn home_url(&self) -> String {
        self.site.home_url()
    }

    fn page(&self) -> Page {
        let url = self.url.as_str();
        if url == self.home_url() {
            return Page::Home;
        }
        if url.starts_with(KEYCLOAK_URL) {
            return Page::KeycloakLogin;
        }
        let Some(path) = url.strip_prefix(BASE_URL) else {
            return Page::Other;
        };
        match path.trim_start_matches('/') {
            "terms/" => Page::Terms,
            "new_project" => Page::NewProject,
            "accounts/login/" => Page::ClassicLogin,
            "admin/" => Page::Admin,
            other => match other.strip_prefix("desktop/") {
                Some(name) => Page::Detail(name.trim_end_matches('/').to_string()),
                None => Page::Other,
            },
        }
    }

    fn login_url(&self) -> String {
        if self.site.use_oidc {
            format!("{}/protocol/openid-connect/auth", KEYCLOAK_URL)
        } else {
            self.site.url("accounts/login/")
        }
    }

    fn landing_url(&self) -> String {
        if !self.logged_in {
            self.login_url()
        } else if self.terms_pending {
            self.site.url("terms/")
        } else {
            self.home_url()
        }
    }

    fn title(&self) -> String {
        match self.page() {
            Page::Home => self.site.home_title.clone(),
            Page::KeycloakLogin => self.site.keycloak_login_title.clone(),
            Page::ClassicLogin => self.site.classic_login_title.clone(),
            Page::Admin => self.site.admin_title.clone(),
            Page::Terms => "Terms of Service | Bumblebee".to_string(),
            Page::Detail(_) | Page::NewProject | Page::Other => "Bumblebee".to_string(),
        }
    }

    fn nodes(&self) -> Vec<Node> {
        match self.page() {
            Page::Home => self.home_nodes(),
            Page::Terms => vec![
                Node::marker(state_marker(State::TermsOfServicePending)),
                Node::control(Locator::xpath(markers::AGREE_TERMS_BUTTON), Control::AgreeTerms),
            ],
            Page::Detail(name) => self.detail_nodes(&DesktopType::new(name)),
            Page::NewProject => {
                let mut nodes: Vec<Node> = markers::WORKSPACE_FORM
                    .iter()
                    .map(|(id, _)| Node::marker(Locator::id(*id)))
                    .collect();
                nodes.push(Node::control(
                    Locator::xpath(markers::PROJECT_SUBMIT),
                    Control::SubmitProject,
                ));
                nodes
            }
            Page::ClassicLogin => vec![
                Node::marker(login_field("login-form", "id_username")),
                Node::marker(login_field("login-form", "id_password")),
                Node::control(
                    Locator::xpath(r#"//form[@id="login-form"]//input[@type="submit"]"#),
                    Control::ClassicLogin,
                ),
            ],
            Page::KeycloakLogin => {
                let mut nodes = vec![Node::marker(Locator::id("kc-form-login"))];
                if self.login_form_revealed {
                    nodes.push(Node::marker(login_field("kc-form-login", "username")));
                    nodes.push(Node::marker(login_field("kc-form-login", "password")));
                    nodes.push(Node::control(
                        login_field("kc-form-login", "kc-login"),
                        Control::KeycloakLogin,
                    ));
                }
                nodes
            }
            Page::Admin | Page::Other => Vec::new(),
        }
    }

    fn home_nodes(&self) -> Vec<Node> {
        if self.garbled_home {
            return Vec::new();
        }
        if self.workspace_pending {
            return vec![Node::control(
                Locator::xpath(markers::CREATE_PROJECT_LINK),
                Control::OpenNewProject,
            )];
        }
        let Some(desktop) = &self.desktop else {
            return if self.busy > 0 {
                Vec::new()
            } else {
                vec![Node::marker(state_marker(State::NoDesktop))]
            };
        };

        let dt = &desktop.desktop_type;
        let mut nodes = vec![Node {
            locator: markers::current_desktop(),
            element: Element {
                text: String::new(),
                id: Some(format!("researcher_desktop-{}", dt)),
            },
            control: Control::Inert,
        }];
        if self.busy > 0 {
            nodes.push(Node {
                locator: markers::progress_message(),
                element: Element {
                    text: "Working on it".to_string(),
                    id: Some(markers::PROGRESS_MESSAGE_ID.to_string()),
                },
                control: Control::Inert,
            });
            nodes.push(Node::marker(markers::progress_bar(dt)));
            return nodes;
        }

        let reboot = ("reboot", vec!["Soft Reboot", "Hard Reboot"]);
        let (shown, commands): (Vec<State>, Vec<(&str, Vec<&str>)>) = match desktop.status {
            Status::Running => (
                vec![State::DesktopExists],
                vec![
                    ("delete", vec!["Delete"]),
                    ("supersize", vec!["Boost"]),
                    ("shelve", vec!["Shelve"]),
                    reboot,
                ],
            ),
            // A boosted desktop carries the running heading too.
            Status::Supersized => (
                vec![State::DesktopSupersized, State::DesktopExists],
                vec![
                    ("delete", vec!["Delete"]),
                    ("downsize", vec!["Downsize"]),
                    ("shelve", vec!["Shelve"]),
                    reboot,
                ],
            ),
            Status::Shelved => (
                vec![State::DesktopShelved],
                vec![("delete", vec!["Delete"]), ("unshelve", vec!["Unshelve"])],
            ),
            Status::Failed => (vec![State::DesktopFailed], vec![("delete", vec!["Delete"])]),
        };
        nodes.extend(shown.iter().map(|s| Node::marker(state_marker(*s))));
        for (verb, labels) in commands {
            nodes.push(Node::control(
                markers::modal_opener(dt, verb),
                Control::OpenModal(verb.to_string()),
            ));
            if self.open_modal.as_deref() == Some(verb) {
                for label in labels {
                    nodes.push(Node::control(
                        markers::modal_confirm(dt, verb, label),
                        Control::Confirm(verb.to_string(), label.to_string()),
                    ));
                }
            }
        }
        nodes
    }

    fn detail_nodes(&self, dt: &DesktopType) -> Vec<Node> {
        let Some(offer) = self.offers.get(dt.as_str()) else {
            return vec![Node::marker(Locator::xpath(markers::PAGE_NOT_FOUND))];
        };
        let mut nodes = vec![Node::marker(Locator::xpath(markers::DEFAULT_SIZE))];
        if offer.boostable {
            nodes.push(Node::marker(Locator::xpath(markers::BOOST_SIZE)));
        }
        nodes.push(Node::control(
            Locator::xpath(markers::CREATE_DESKTOP_BUTTON),
            Control::OpenLaunch,
        ));
        if self.launch_blocked || self.desktop.is_some() {
            nodes.push(Node::marker(Locator::xpath(markers::LAUNCH_BLOCKED_TOOLTIP)));
        }
        match &offer.zones {
            Zones::Hidden => {}
            Zones::Fixed(zone) => {
                nodes.push(Node::marker(markers::fixed_zone(dt, zone)));
                nodes.push(Node::marker(markers::any_fixed_zone(dt)));
            }
            Zones::Choice(_) => {
                nodes.push(Node::marker(markers::zone_select(dt)));
                nodes.push(Node::marker(markers::preselected_zone(dt)));
            }
        }
        nodes.push(Node::control(
            Locator::xpath(markers::CREATE_SUBMIT),
            Control::SubmitLaunch(dt.clone()),
        ));
        nodes
    }

    fn lookup(&self, locator: &Locator) -> Option<Node> {
        self.nodes().into_iter().find(|n| &n.locator == locator)
    }

    fn start_workflow(&mut self) {
        self.busy = self.workflow_polls;
    }

    fn apply(&mut self, control: Control) -> DriverResult<ClickOutcome> {
        match control {
            Control::Inert => {}
            Control::OpenLaunch => {
                if self.launch_blocked || self.desktop.is_some() {
                    return Ok(ClickOutcome::Intercepted);
                }
            }
            Control::SubmitLaunch(dt) => {
                let zone = match self.offers.get(dt.as_str()).map(|o| &o.zones) {
                    Some(Zones::Fixed(zone)) => Some(zone.clone()),
                    _ => self.selected_zone.clone(),
                };
                self.commands.push(format!("launch {}", dt));
                self.desktop = Some(Desktop {
                    desktop_type: dt,
                    status: Status::Running,
                    zone,
                });
                self.start_workflow();
                if !self.skip_redirect {
                    self.url = self.home_url();
                }
            }
            Control::OpenModal(verb) => self.open_modal = Some(verb),
            Control::Confirm(verb, label) => {
                self.open_modal = None;
                self.commands.push(match verb.as_str() {
                    "reboot" => label.to_lowercase(),
                    _ => verb.clone(),
                });
                let broken = self.break_next.take_if_eq(&verb);
                if verb == "delete" {
                    match self.desktop.as_mut() {
                        Some(desktop) if broken => desktop.status = Status::Failed,
                        _ => self.desktop = None,
                    }
                } else if let Some(desktop) = self.desktop.as_mut() {
                    desktop.status = match verb.as_str() {
                        _ if broken => Status::Failed,
                        "supersize" => Status::Supersized,
                        "downsize" | "unshelve" => Status::Running,
                        "shelve" => Status::Shelved,
                        _ => desktop.status,
                    };
                    self.start_workflow();
                }
            }
            Control::AgreeTerms => {
                self.commands.push("agree-terms".to_string());
                self.terms_pending = false;
            }
            Control::OpenNewProject => self.url = self.site.url("new_project"),
            Control::SubmitProject => {
                for (id, _) in markers::WORKSPACE_FORM {
                    if !self.fields.contains_key(&Locator::id(*id).to_string()) {
                        return Err(DriverError::Browser(format!("{} is required", id)));
                    }
                }
                self.commands.push("create-workspace".to_string());
                self.workspace_pending = false;
                self.url = self.home_url();
            }
            Control::ClassicLogin => {
                self.check_credentials("login-form", "id_username", "id_password");
                self.url = if !self.logged_in {
                    self.login_url()
                } else if self.staff {
                    self.site.url("admin/")
                } else {
                    self.landing_url()
                };
            }
            Control::KeycloakLogin => {
                self.check_credentials("kc-form-login", "username", "password");
                self.url = self.landing_url();
            }
        }
        Ok(ClickOutcome::Clicked)
    }

    fn check_credentials(&mut self, form: &str, user_id: &str, password_id: &str) {
        let user = self.fields.get(&login_field(form, user_id).to_string());
        let password = self.fields.get(&login_field(form, password_id).to_string());
        self.logged_in =
            user.map(String::as_str) == Some(USERNAME) && password.map(String::as_str) == Some(PASSWORD);
    }
}

trait TakeIfEq {
    fn take_if_eq(&mut self, verb: &str) -> bool;
}

impl TakeIfEq for Option<&'static str> {
    fn take_if_eq(&mut self, verb: &str) -> bool {
        if *self == Some(verb) {
            *self = None;
            true
        } else {
            false
        }
    }
}

pub fn state_marker(state: State) -> Locator {
    markers::state_markers()
        .find(|(_, s)| *s == state)
        .map(|(locator, _)| locator)
        .unwrap()
}

pub fn login_field(form: &str, id: &str) -> Locator {
    Locator::xpath(format!(r#"//form[@id="{}"]//*[@id="{}"]"#, form, id))
}

/// Shared handle on the fake service.
#[derive(Clone)]
pub struct FakeService(Arc<Mutex<Service>>);

impl FakeService {
    /// A logged-in user with no desktop. `ubuntu` can be boosted, `centos`
    /// cannot; neither offers a zone choice.
    pub fn new() -> Self {
        let mut site = SiteConfig::new(BASE_URL, "ubuntu");
        site.username = USERNAME.to_string();
        site.password = PASSWORD.to_string();

        let mut offers = BTreeMap::new();
        offers.insert(
            "ubuntu".to_string(),
            Offer {
                boostable: true,
                zones: Zones::Hidden,
            },
        );
        offers.insert(
            "centos".to_string(),
            Offer {
                boostable: false,
                zones: Zones::Hidden,
            },
        );

        Self(Arc::new(Mutex::new(Service {
            url: "about:blank".to_string(),
            site,
            logged_in: true,
            staff: false,
            terms_pending: false,
            workspace_pending: false,
            offers,
            desktop: None,
            workflow_polls: 3,
            busy: 0,
            hang: false,
            break_next: None,
            launch_blocked: false,
            skip_redirect: false,
            garbled_home: false,
            open_modal: None,
            login_form_revealed: false,
            fields: BTreeMap::new(),
            selected_zone: None,
            commands: Vec::new(),
            closed: false,
        })))
    }

    pub fn lock(&self) -> MutexGuard<'_, Service> {
        self.0.lock().unwrap()
    }

    pub fn with_desktop(self, desktop_type: &str, status: Status) -> Self {
        self.lock().desktop = Some(Desktop {
            desktop_type: DesktopType::new(desktop_type),
            status,
            zone: None,
        });
        self
    }

    pub fn with_zones(self, desktop_type: &str, zones: Zones) -> Self {
        if let Some(offer) = self.lock().offers.get_mut(desktop_type) {
            offer.zones = zones;
        }
        self
    }

    /// A fresh account that has not been through onboarding.
    pub fn new_user(self) -> Self {
        {
            let mut service = self.lock();
            service.terms_pending = true;
            service.workspace_pending = true;
        }
        self
    }

    pub fn logged_out(self, use_oidc: bool) -> Self {
        {
            let mut service = self.lock();
            service.logged_in = false;
            service.site.use_oidc = use_oidc;
        }
        self
    }

    pub fn site(&self) -> SiteConfig {
        self.lock().site.clone()
    }

    pub fn browser(&self) -> FakeBrowser {
        FakeBrowser(self.0.clone())
    }

    pub fn session(&self) -> Session {
        Session::new(Box::new(self.browser()), self.site())
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn desktop(&self) -> Option<Desktop> {
        self.lock().desktop.clone()
    }
}

pub struct FakeBrowser(Arc<Mutex<Service>>);

impl FakeBrowser {
    fn service(&self) -> MutexGuard<'_, Service> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn current_url(&mut self) -> DriverResult<String> {
        Ok(self.service().url.clone())
    }

    async fn title(&mut self) -> DriverResult<String> {
        Ok(self.service().title())
    }

    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        let mut service = self.service();
        service.open_modal = None;
        service.url = if url == service.home_url() || !service.logged_in {
            service.landing_url()
        } else {
            url.to_string()
        };
        Ok(())
    }

    async fn find(&mut self, locator: &Locator) -> DriverResult<Option<Element>> {
        let mut service = self.service();
        if *locator == markers::worker_busy() {
            if service.page() != Page::Home || service.busy == 0 {
                return Ok(None);
            }
            if !service.hang {
                service.busy -= 1;
            }
            return Ok(Some(Element {
                text: "The worker is busy, please wait".to_string(),
                id: None,
            }));
        }
        Ok(service.lookup(locator).map(|n| n.element))
    }

    async fn attribute(&mut self, locator: &Locator, name: &str) -> DriverResult<Option<String>> {
        let service = self.service();
        if service.lookup(locator).is_none() {
            return Ok(None);
        }
        if name == "value" {
            let preselected = service.offers.iter().find_map(|(dt, offer)| match &offer.zones {
                Zones::Choice(zones)
                    if *locator == markers::preselected_zone(&DesktopType::new(dt.as_str())) =>
                {
                    zones.first().map(|z| z.as_str().to_string())
                }
                _ => None,
            });
            if preselected.is_some() {
                return Ok(preselected);
            }
        }
        let is_bar = service
            .desktop
            .as_ref()
            .is_some_and(|d| *locator == markers::progress_bar(&d.desktop_type));
        if is_bar && name == markers::PROGRESS_VALUE_ATTR {
            let done = service.workflow_polls.saturating_sub(service.busy);
            return Ok(Some((done * 100 / service.workflow_polls.max(1)).to_string()));
        }
        Ok(None)
    }

    async fn click(&mut self, locator: &Locator) -> DriverResult<ClickOutcome> {
        let mut service = self.service();
        let node = service
            .lookup(locator)
            .ok_or_else(|| DriverError::ElementNotFound(locator.to_string()))?;
        service.apply(node.control)
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> DriverResult<()> {
        let mut service = self.service();
        if service.lookup(locator).is_none() {
            return Err(DriverError::ElementNotFound(locator.to_string()));
        }
        service.fields.insert(locator.to_string(), value.to_string());
        Ok(())
    }

    async fn select_option(&mut self, locator: &Locator, value: &str) -> DriverResult<bool> {
        let mut service = self.service();
        if service.lookup(locator).is_none() {
            return Err(DriverError::ElementNotFound(locator.to_string()));
        }
        let Page::Detail(name) = service.page() else {
            return Ok(false);
        };
        let offered = match service.offers.get(&name).map(|o| &o.zones) {
            Some(Zones::Choice(zones)) => zones.iter().any(|z| z.as_str() == value),
            _ => false,
        };
        if offered {
            service.selected_zone = Some(Zone::new(value));
        }
        Ok(offered)
    }

    async fn reveal(&mut self, locator: &Locator) -> DriverResult<()> {
        let mut service = self.service();
        if service.lookup(locator).is_none() {
            return Err(DriverError::ElementNotFound(locator.to_string()));
        }
        if *locator == Locator::id("kc-form-login") {
            service.login_form_revealed = true;
        }
        Ok(())
    }

    async fn page_source(&mut self) -> DriverResult<String> {
        let service = self.service();
        Ok(format!(
            "<html><head><title>{}</title></head><body><!-- {} --></body></html>",
            service.title(),
            service.url
        ))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.service().closed = true;
        Ok(())
    }
}
