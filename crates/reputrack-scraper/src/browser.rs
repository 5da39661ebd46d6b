//! Browser automation capability used by the extractor.
//!
//! The extractor only ever talks to these traits. [`crate::webdriver`] holds
//! the production implementation; tests drive the extractor with scripted
//! sessions.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::BrowserError;

/// Interval between probes while waiting for a locator to match.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Standard desktop Chrome user agents; one is picked per session.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// Init script run before any page script: hides the automation flag and
/// stubs the `window.chrome` object headless Chrome lacks.
pub const STEALTH_SCRIPT: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = window.chrome || { runtime: {} };
";

/// Viewport every session uses.
pub const VIEWPORT: (u32, u32) = (1920, 1080);

/// Driver-side page load bound when the caller sets none.
pub const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Driver-side bound on injected scripts (scrolling, `scrollIntoView`).
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// A structural query against the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    #[must_use]
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    #[must_use]
    pub fn xpath(expr: &str) -> Self {
        Locator::XPath(expr.to_string())
    }

    /// A `tag` element whose normalised text contains `label`, e.g. a
    /// "Load More" button.
    #[must_use]
    pub fn text_control(tag: &str, label: &str) -> Self {
        Locator::XPath(format!(
            "//{tag}[contains(normalize-space(.), '{}')]",
            label.replace('\'', "")
        ))
    }

    /// The W3C `using` strategy name.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css selector",
            Locator::XPath(_) => "xpath",
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Locator::Css(v) | Locator::XPath(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(v) => write!(f, "css:{v}"),
            Locator::XPath(v) => write!(f, "xpath:{v}"),
        }
    }
}

/// Opaque reference to an element inside one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// Per-session browser settings, applied before the first navigation.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub headless: bool,
    pub extra_headers: Vec<(String, String)>,
    pub init_script: String,
    /// Sent to the driver so an abandoned navigation stops loading on its
    /// side too, instead of blocking the session delete behind it.
    pub page_load_timeout: Duration,
}

impl SessionOptions {
    /// Options with a randomly chosen user agent and the stealth script.
    #[must_use]
    pub fn randomized(headless: bool) -> Self {
        Self {
            user_agent: random_user_agent().to_string(),
            viewport: VIEWPORT,
            headless,
            extra_headers: Vec::new(),
            init_script: STEALTH_SCRIPT.to_string(),
            page_load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_extra_headers(mut self, headers: &[(&str, &str)]) -> Self {
        self.extra_headers = headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self
    }
}

fn random_user_agent() -> &'static str {
    let idx = rand::rng().random_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Opens isolated browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Open a fresh session with `options` applied.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] if the browser cannot start a session.
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One isolated page session.
///
/// Every method that waits on the page takes an explicit bound; none may
/// block indefinitely.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate and return once the DOM is ready. Does not wait for the
    /// network to go idle.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// All elements matching `locator`, in document order. No match is an
    /// empty list, not an error.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, BrowserError>;

    /// All descendants of `element` matching `locator`.
    async fn find_within(
        &self,
        element: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    async fn inner_text(
        &self,
        element: &ElementHandle,
        timeout: Duration,
    ) -> Result<String, BrowserError>;

    /// Serialized HTML of the current document.
    async fn page_source(&self, timeout: Duration) -> Result<String, BrowserError>;

    /// Scroll the window to `fraction` of the document height.
    async fn scroll_to_fraction(&self, fraction: f64) -> Result<(), BrowserError>;

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    async fn click(&self, element: &ElementHandle, timeout: Duration) -> Result<(), BrowserError>;

    /// Release the session. Must be safe to call after any other failure.
    async fn close(&self) -> Result<(), BrowserError>;

    /// Poll until `locator` matches at least one element.
    ///
    /// Returns `Ok(false)` when `timeout` elapses first. Fatal session errors
    /// end the wait early.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<bool, BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.find_all(locator).await {
                Ok(found) if !found.is_empty() => return Ok(true),
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => tracing::debug!(%locator, error = %err, "wait probe failed"),
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
