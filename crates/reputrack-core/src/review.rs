//! Review records and the values passed between extraction and analysis.

use serde::{Deserialize, Serialize};

/// Star count used when a platform shows no per-review rating.
pub const DEFAULT_STARS: u8 = 5;

/// A single customer review read from a product page.
///
/// `authenticity` and `sentiment` are filled in by the analysis stages. A
/// review is only persisted once both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub text: String,
    /// Star count in `1..=5`.
    pub stars: u8,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub authenticity: Option<Authenticity>,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl Review {
    /// Build an unannotated review, clamping `stars` into `1..=5`.
    #[must_use]
    pub fn new(text: impl Into<String>, stars: u8) -> Self {
        Self {
            text: text.into(),
            stars: stars.clamp(1, 5),
            authenticity: None,
            sentiment: None,
        }
    }

    /// `true` once both analysis stages have annotated this review.
    #[must_use]
    pub fn is_fully_annotated(&self) -> bool {
        self.authenticity.is_some() && self.sentiment.is_some()
    }
}

/// Authenticity verdict from the ensemble scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Authenticity {
    pub is_fake: bool,
    /// Fused fake probability in `[0, 1]`, rounded to 3 decimals.
    pub fake_probability: f64,
}

/// Polarity reported by the sentiment classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
}

/// Raw sentiment label and classifier confidence for one review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    #[serde(rename = "sentiment")]
    pub label: SentimentLabel,
    /// Classifier confidence, rounded to 3 decimals.
    #[serde(rename = "sentiment_score")]
    pub confidence: f64,
}

/// Output of one page extraction: the only contract between the extractor
/// and the rest of the pipeline.
///
/// When `error` is set, `rating` is `None` and `reviews` is empty. Use
/// [`ExtractionResult::failed`] to build that shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub rating: Option<f64>,
    pub reviews: Vec<Review>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// A completed extraction; `note` explains an empty review list.
    #[must_use]
    pub fn completed(rating: Option<f64>, reviews: Vec<Review>) -> Self {
        let note = reviews
            .is_empty()
            .then(|| "No reviews found on product page".to_string());
        Self {
            rating,
            reviews,
            note,
            error: None,
        }
    }

    /// A failed extraction carrying only the error text.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            rating: None,
            reviews: Vec::new(),
            note: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Counts of reviews per sentiment bucket. Sums to the number of reviews
/// analysed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: u32,
    pub negative: u32,
    pub neutral: u32,
}

impl SentimentBreakdown {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.positive + self.negative + self.neutral
    }
}

/// Derived scores for one link, recomputed every run and written together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    /// Share of reviews judged fake, in `[0, 1]`.
    pub fake_ratio: f64,
    /// `(positive - negative) / total`, in `[-1, 1]`.
    pub sentiment_score: f64,
    pub sentiment_breakdown: SentimentBreakdown,
}

/// Round to 3 decimal places, the precision every stored score uses.
#[must_use]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
