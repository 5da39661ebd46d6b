//! Ensemble authenticity scoring.

use std::sync::Arc;

use reputrack_core::{round3, Authenticity, Review};

use crate::error::NlpError;
use crate::model::{normalize_for_authenticity, FakeProbabilityModel};

/// Fused probability above which a review is marked fake.
pub const FAKE_THRESHOLD: f64 = 0.5;

/// Fuses two independently trained fake-review classifiers by unweighted mean.
#[derive(Clone)]
pub struct AuthenticityScorer {
    transformer: Arc<dyn FakeProbabilityModel>,
    recurrent: Arc<dyn FakeProbabilityModel>,
}

impl AuthenticityScorer {
    #[must_use]
    pub fn new(
        transformer: Arc<dyn FakeProbabilityModel>,
        recurrent: Arc<dyn FakeProbabilityModel>,
    ) -> Self {
        Self {
            transformer,
            recurrent,
        }
    }

    /// Annotate every review with a verdict and return the fake ratio.
    ///
    /// Both models are queried concurrently with the same normalised texts.
    /// Reviews are only touched once both have answered for every input, so a
    /// failure leaves `reviews` exactly as it was. Empty input returns `0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`NlpError`] if either model fails or answers for the wrong
    /// number of texts.
    pub async fn score(&self, reviews: &mut [Review]) -> Result<f64, NlpError> {
        if reviews.is_empty() {
            return Ok(0.0);
        }

        let texts: Vec<String> = reviews
            .iter()
            .map(|r| normalize_for_authenticity(&r.text))
            .collect();

        let (transformer, recurrent) = futures::try_join!(
            self.transformer.fake_probabilities(&texts),
            self.recurrent.fake_probabilities(&texts),
        )?;

        for (service, got) in [
            ("transformer classifier", transformer.len()),
            ("recurrent classifier", recurrent.len()),
        ] {
            if got != texts.len() {
                return Err(NlpError::LengthMismatch {
                    service,
                    expected: texts.len(),
                    got,
                });
            }
        }

        let mut fake_count = 0usize;
        for ((review, t), r) in reviews.iter_mut().zip(&transformer).zip(&recurrent) {
            let fused = (t + r) / 2.0;
            let is_fake = fused > FAKE_THRESHOLD;
            if is_fake {
                fake_count += 1;
            }
            review.authenticity = Some(Authenticity {
                is_fake,
                fake_probability: round3(fused),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = round3(fake_count as f64 / reviews.len() as f64);
        tracing::debug!(reviews = reviews.len(), fake_count, fake_ratio = ratio, "authenticity scored");
        Ok(ratio)
    }
}
