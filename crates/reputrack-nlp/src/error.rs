use thiserror::Error;

#[derive(Debug, Error)]
pub enum NlpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} response parse error: {reason}")]
    Parse {
        service: &'static str,
        reason: String,
    },

    #[error("{service} returned {got} results for {expected} inputs")]
    LengthMismatch {
        service: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{service} response has no score for label {label}")]
    MissingLabel {
        service: &'static str,
        label: String,
    },

    #[error("unrecognised sentiment label: {0}")]
    UnknownLabel(String),

    #[error("vocabulary {path}: {reason}")]
    Vocabulary { path: String, reason: String },
}
