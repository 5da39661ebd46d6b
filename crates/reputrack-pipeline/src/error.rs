use reputrack_db::DbError;
use reputrack_nlp::NlpError;
use reputrack_scraper::BrowserError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tracked link {0} not found")]
    LinkNotFound(i64),

    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("e-mail API returned status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("tracked link {0} not found")]
    LinkNotFound(i64),

    #[error("link store error: {0}")]
    Store(#[from] StoreError),

    #[error("could not set up analysis models: {0}")]
    Models(#[from] NlpError),

    #[error("could not set up browser automation: {0}")]
    Browser(#[from] BrowserError),

    #[error("could not set up notifier: {0}")]
    Notifier(#[from] NotifyError),
}
