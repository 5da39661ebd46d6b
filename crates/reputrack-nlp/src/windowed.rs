//! Recurrent authenticity model behind a model-serving predict endpoint.
//!
//! Texts are encoded client-side into a fixed window of vocabulary indices;
//! the server returns two raw logits per row.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NlpError;
use crate::model::FakeProbabilityModel;

/// Tokens per encoded review. Longer texts are truncated, shorter ones padded.
pub const WINDOW: usize = 100;
pub const PAD_INDEX: u32 = 0;
pub const UNKNOWN_INDEX: u32 = 1;

const BATCH_SIZE: usize = 64;

const SERVICE: &str = "recurrent classifier";

/// Word to index mapping the recurrent model was trained with.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    index: HashMap<String, u32>,
}

impl Vocabulary {
    /// Load a JSON object of `word -> index`.
    ///
    /// # Errors
    ///
    /// Returns [`NlpError::Vocabulary`] if the file is unreadable or not a
    /// flat JSON object of non-negative integers.
    pub fn load(path: &Path) -> Result<Self, NlpError> {
        let vocab_error = |reason: String| NlpError::Vocabulary {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| vocab_error(e.to_string()))?;
        let index: HashMap<String, u32> =
            serde_json::from_str(&raw).map_err(|e| vocab_error(e.to_string()))?;
        tracing::info!(path = %path.display(), words = index.len(), "loaded vocabulary");
        Ok(Self { index })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Encode an already normalised text into exactly [`WINDOW`] indices.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut window: Vec<u32> = text
            .split_whitespace()
            .take(WINDOW)
            .map(|word| self.index.get(word).copied().unwrap_or(UNKNOWN_INDEX))
            .collect();
        window.resize(WINDOW, PAD_INDEX);
        window
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        Self {
            index: iter.into_iter().map(|(w, i)| (w.into(), i)).collect(),
        }
    }
}

/// Client for the windowed recurrent classifier.
pub struct WindowedClassifier {
    client: reqwest::Client,
    url: String,
    vocabulary: Vocabulary,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: &'a [Vec<u32>],
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f64>>,
}

impl WindowedClassifier {
    /// # Errors
    ///
    /// Returns [`NlpError::Http`] if the HTTP client cannot be built.
    pub fn new(
        predict_url: &str,
        vocabulary: Vocabulary,
        timeout: Duration,
    ) -> Result<Self, NlpError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: predict_url.to_string(),
            vocabulary,
        })
    }
}

/// Probability of class 1 from a two-logit row.
fn class_one_probability(logits: &[f64]) -> Result<f64, NlpError> {
    let [l0, l1] = logits else {
        return Err(NlpError::Parse {
            service: SERVICE,
            reason: format!("expected 2 logits per row, got {}", logits.len()),
        });
    };
    let max = l0.max(*l1);
    let e0 = (l0 - max).exp();
    let e1 = (l1 - max).exp();
    Ok(e1 / (e0 + e1))
}

#[async_trait]
impl FakeProbabilityModel for WindowedClassifier {
    async fn fake_probabilities(&self, texts: &[String]) -> Result<Vec<f64>, NlpError> {
        let encoded: Vec<Vec<u32>> = texts.iter().map(|t| self.vocabulary.encode(t)).collect();
        let mut probabilities = Vec::with_capacity(texts.len());

        for chunk in encoded.chunks(BATCH_SIZE) {
            let response = self
                .client
                .post(&self.url)
                .json(&PredictRequest { instances: chunk })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(NlpError::Status {
                    service: SERVICE,
                    status: response.status().as_u16(),
                });
            }

            let body: PredictResponse = response.json().await.map_err(|e| NlpError::Parse {
                service: SERVICE,
                reason: e.to_string(),
            })?;

            if body.predictions.len() != chunk.len() {
                return Err(NlpError::LengthMismatch {
                    service: SERVICE,
                    expected: chunk.len(),
                    got: body.predictions.len(),
                });
            }

            for row in &body.predictions {
                probabilities.push(class_one_probability(row)?);
            }
        }

        Ok(probabilities)
    }
}
