//! Browser session interface
//!
//! The lifecycle core needs very little from the rendering surface: the
//! current URL and title, navigation, and element queries by locator. The
//! `BrowserSession` trait captures exactly that so the core can run against
//! the Playwright bridge or an in-memory fake.

use async_trait::async_trait;
use std::fmt;

use crate::error::DriverResult;

/// How an element is located on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    XPath(String),
    Id(String),
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    /// Selector string understood by Playwright's `page.locator()`.
    pub fn to_playwright(&self) -> String {
        match self {
            Locator::XPath(expr) => format!("xpath={}", expr),
            Locator::Id(id) => format!("[id=\"{}\"]", id.replace('"', "\\\"")),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(expr) => write!(f, "xpath {}", expr),
            Locator::Id(id) => write!(f, "id {}", id),
        }
    }
}

/// A matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Text content of the element
    pub text: String,
    /// Value of its `id` attribute, when it has one
    pub id: Option<String>,
}

/// Result of clicking an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Clicked,
    /// The element exists but something (disabled state, an overlay) stopped
    /// the click from reaching it.
    Intercepted,
}

#[async_trait]
pub trait BrowserSession: Send {
    /// URL of the page currently rendered.
    async fn current_url(&mut self) -> DriverResult<String>;

    /// Title of the page currently rendered.
    async fn title(&mut self) -> DriverResult<String>;

    /// Navigate to an absolute URL and wait for the page to load.
    async fn goto(&mut self, url: &str) -> DriverResult<()>;

    /// First element matching the locator, if any.
    async fn find(&mut self, locator: &Locator) -> DriverResult<Option<Element>>;

    /// Attribute of the first matching element. `None` if either the element
    /// or the attribute is missing.
    async fn attribute(&mut self, locator: &Locator, name: &str) -> DriverResult<Option<String>>;

    /// Click the first matching element. Missing elements are an
    /// `ElementNotFound` error.
    async fn click(&mut self, locator: &Locator) -> DriverResult<ClickOutcome>;

    /// Type a value into the first matching input.
    async fn fill(&mut self, locator: &Locator, value: &str) -> DriverResult<()>;

    /// Select an option of a `<select>` by value. Returns false when no
    /// option carries that value.
    async fn select_option(&mut self, locator: &Locator, value: &str) -> DriverResult<bool>;

    /// Make a hidden element displayable.
    async fn reveal(&mut self, locator: &Locator) -> DriverResult<()>;

    /// Full markup of the current page.
    async fn page_source(&mut self) -> DriverResult<String>;

    /// Shut the browser down.
    async fn close(&mut self) -> DriverResult<()>;

    /// Convenience: whether any element matches.
    async fn exists(&mut self, locator: &Locator) -> DriverResult<bool> {
        Ok(self.find(locator).await?.is_some())
    }
}
