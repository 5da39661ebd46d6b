//! The classifier capabilities the analysis stages depend on.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reputrack_core::SentimentLabel;

use crate::error::NlpError;

static NON_ALPHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z\s]").expect("valid regex"));

/// Lowercase `text` and drop everything except ASCII letters and whitespace.
///
/// Both authenticity models see exactly this form of a review.
#[must_use]
pub fn normalize_for_authenticity(text: &str) -> String {
    NON_ALPHA.replace_all(&text.to_lowercase(), "").into_owned()
}

/// A binary classifier returning P(fake) for each input text.
///
/// Implementations return exactly one probability per input, in input order,
/// or an error. They hold no per-call state and are shared across link
/// pipelines.
#[async_trait]
pub trait FakeProbabilityModel: Send + Sync {
    async fn fake_probabilities(&self, texts: &[String]) -> Result<Vec<f64>, NlpError>;
}

/// Top label and confidence for one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentPrediction {
    pub label: SentimentLabel,
    pub confidence: f64,
}

/// A binary sentiment classifier.
#[async_trait]
pub trait SentimentModel: Send + Sync {
    async fn predict(&self, texts: &[String]) -> Result<Vec<SentimentPrediction>, NlpError>;
}

/// Map a classifier label onto a polarity.
///
/// Accepts the SST-2 style names and the generic `LABEL_0`/`LABEL_1`.
///
/// # Errors
///
/// Returns [`NlpError::UnknownLabel`] for anything else.
pub fn parse_sentiment_label(label: &str) -> Result<SentimentLabel, NlpError> {
    match label.to_ascii_uppercase().as_str() {
        "POSITIVE" | "POS" | "LABEL_1" => Ok(SentimentLabel::Positive),
        "NEGATIVE" | "NEG" | "LABEL_0" => Ok(SentimentLabel::Negative),
        _ => Err(NlpError::UnknownLabel(label.to_string())),
    }
}
