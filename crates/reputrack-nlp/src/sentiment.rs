//! Per-review sentiment labelling and the aggregate link score.

use std::sync::Arc;

use reputrack_core::{round3, Review, Sentiment, SentimentBreakdown, SentimentLabel};

use crate::error::NlpError;
use crate::model::SentimentModel;

/// Confidence a prediction must exceed to count as polar. Anything at or
/// below is bucketed neutral whatever its label.
pub const POLARITY_CONFIDENCE: f64 = 0.6;

#[derive(Clone)]
pub struct SentimentAggregator {
    model: Arc<dyn SentimentModel>,
}

impl SentimentAggregator {
    #[must_use]
    pub fn new(model: Arc<dyn SentimentModel>) -> Self {
        Self { model }
    }

    /// Annotate every review with its raw label and confidence, returning
    /// `(positive - negative) / total` and the bucket counts.
    ///
    /// The classifier sees the raw review text. Empty input returns
    /// `(0.0, {0, 0, 0})`. On error no review is modified.
    ///
    /// # Errors
    ///
    /// Returns [`NlpError`] if the classifier fails or answers for the wrong
    /// number of texts.
    pub async fn aggregate(
        &self,
        reviews: &mut [Review],
    ) -> Result<(f64, SentimentBreakdown), NlpError> {
        if reviews.is_empty() {
            return Ok((0.0, SentimentBreakdown::default()));
        }

        let texts: Vec<String> = reviews.iter().map(|r| r.text.clone()).collect();
        let predictions = self.model.predict(&texts).await?;
        if predictions.len() != texts.len() {
            return Err(NlpError::LengthMismatch {
                service: "sentiment classifier",
                expected: texts.len(),
                got: predictions.len(),
            });
        }

        let mut breakdown = SentimentBreakdown::default();
        for (review, prediction) in reviews.iter_mut().zip(&predictions) {
            match prediction.label {
                _ if prediction.confidence <= POLARITY_CONFIDENCE => breakdown.neutral += 1,
                SentimentLabel::Positive => breakdown.positive += 1,
                SentimentLabel::Negative => breakdown.negative += 1,
            }
            review.sentiment = Some(Sentiment {
                label: prediction.label,
                confidence: round3(prediction.confidence),
            });
        }

        let score = round3(
            (f64::from(breakdown.positive) - f64::from(breakdown.negative))
                / f64::from(breakdown.total()),
        );
        tracing::debug!(
            reviews = reviews.len(),
            positive = breakdown.positive,
            negative = breakdown.negative,
            neutral = breakdown.neutral,
            sentiment_score = score,
            "sentiment aggregated"
        );
        Ok((score, breakdown))
    }
}
