use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("WebDriver transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("session not created: {message}")]
    SessionNotCreated { message: String },

    #[error("WebDriver error {status} ({error}) during {operation}: {message}")]
    WebDriver {
        operation: String,
        status: u16,
        error: String,
        message: String,
    },

    #[error("unexpected WebDriver response for {operation}: {reason}")]
    UnexpectedResponse { operation: String, reason: String },
}

impl BrowserError {
    /// `true` when the session itself is unusable, so no later step on the
    /// same page can succeed.
    ///
    /// Everything else (a missing element, a stale handle, a slow read) only
    /// fails the strategy that hit it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            BrowserError::Http(_) | BrowserError::SessionNotCreated { .. } => true,
            BrowserError::WebDriver { error, .. } => {
                matches!(error.as_str(), "invalid session id" | "no such window")
            }
            BrowserError::Timeout { .. } | BrowserError::UnexpectedResponse { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not open browser session: {0}")]
    SessionOpen(#[source] BrowserError),

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("no extraction profile registered for platform {0}")]
    UnsupportedPlatform(String),

    #[error("extraction panicked")]
    Panicked,
}
