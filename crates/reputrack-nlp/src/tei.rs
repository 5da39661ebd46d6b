//! TEI (Text Embeddings Inference) client for sequence-classification models.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NlpError;
use crate::model::{parse_sentiment_label, FakeProbabilityModel, SentimentModel, SentimentPrediction};

/// Maximum number of texts per /predict call.
const BATCH_SIZE: usize = 64;

const SERVICE: &str = "TEI";

/// A classifier served by TEI's `/predict` route.
///
/// The same client serves both the transformer authenticity model (reading the
/// score of `positive_label`) and the sentiment model (reading the top label).
pub struct TeiClassifier {
    client: reqwest::Client,
    url: String,
    positive_label: String,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    score: f64,
    label: String,
}

impl TeiClassifier {
    /// Create a client for the TEI instance at `tei_url`.
    ///
    /// `positive_label` names the class whose score is reported by
    /// [`FakeProbabilityModel::fake_probabilities`].
    ///
    /// # Errors
    ///
    /// Returns [`NlpError::Http`] if the HTTP client cannot be built.
    pub fn new(
        tei_url: &str,
        positive_label: &str,
        timeout: Duration,
    ) -> Result<Self, NlpError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/predict", tei_url.trim_end_matches('/')),
            positive_label: positive_label.to_string(),
        })
    }

    /// Every label score for every text, in input order.
    ///
    /// Texts are sent in groups of [`BATCH_SIZE`] (64) per request.
    async fn classify(&self, texts: &[String]) -> Result<Vec<Vec<LabelScore>>, NlpError> {
        let mut all_scores = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = PredictRequest {
                inputs: chunk,
                truncate: true,
            };
            let response = self.client.post(&self.url).json(&request).send().await?;

            if !response.status().is_success() {
                return Err(NlpError::Status {
                    service: SERVICE,
                    status: response.status().as_u16(),
                });
            }

            let scores: Vec<Vec<LabelScore>> =
                response.json().await.map_err(|e| NlpError::Parse {
                    service: SERVICE,
                    reason: e.to_string(),
                })?;

            if scores.len() != chunk.len() {
                return Err(NlpError::LengthMismatch {
                    service: SERVICE,
                    expected: chunk.len(),
                    got: scores.len(),
                });
            }

            all_scores.extend(scores);
        }

        tracing::debug!(url = %self.url, texts = texts.len(), "TEI classification complete");
        Ok(all_scores)
    }
}

#[async_trait]
impl FakeProbabilityModel for TeiClassifier {
    async fn fake_probabilities(&self, texts: &[String]) -> Result<Vec<f64>, NlpError> {
        self.classify(texts)
            .await?
            .into_iter()
            .map(|scores| {
                scores
                    .iter()
                    .find(|s| s.label == self.positive_label)
                    .map(|s| s.score)
                    .ok_or_else(|| NlpError::MissingLabel {
                        service: SERVICE,
                        label: self.positive_label.clone(),
                    })
            })
            .collect()
    }
}

#[async_trait]
impl SentimentModel for TeiClassifier {
    async fn predict(&self, texts: &[String]) -> Result<Vec<SentimentPrediction>, NlpError> {
        self.classify(texts)
            .await?
            .into_iter()
            .map(|scores| {
                let top = scores
                    .iter()
                    .max_by(|a, b| a.score.total_cmp(&b.score))
                    .ok_or_else(|| NlpError::Parse {
                        service: SERVICE,
                        reason: "empty label list".to_string(),
                    })?;
                Ok(SentimentPrediction {
                    label: parse_sentiment_label(&top.label)?,
                    confidence: top.score,
                })
            })
            .collect()
    }
}
