//! Construction of the long-lived classifier clients.

use std::sync::Arc;
use std::time::Duration;

use reputrack_core::AppConfig;

use crate::authenticity::AuthenticityScorer;
use crate::error::NlpError;
use crate::sentiment::SentimentAggregator;
use crate::tei::TeiClassifier;
use crate::windowed::{Vocabulary, WindowedClassifier};

/// Both analysis stages, built once at startup and shared read-only by every
/// link pipeline.
#[derive(Clone)]
pub struct AnalysisModels {
    pub authenticity: AuthenticityScorer,
    pub sentiment: SentimentAggregator,
}

impl AnalysisModels {
    /// Build clients for the two authenticity models and the sentiment model.
    ///
    /// The recurrent model's vocabulary is read from disk here, once.
    ///
    /// # Errors
    ///
    /// Returns [`NlpError`] if the vocabulary cannot be loaded or an HTTP
    /// client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, NlpError> {
        let timeout = Duration::from_secs(config.classifier_timeout_secs);

        let transformer = TeiClassifier::new(
            &config.fake_transformer_url,
            &config.fake_transformer_label,
            timeout,
        )?;
        let vocabulary = Vocabulary::load(&config.fake_recurrent_vocab)?;
        let recurrent = WindowedClassifier::new(&config.fake_recurrent_url, vocabulary, timeout)?;
        // The sentiment model reports its top label; no positive label is read.
        let sentiment = TeiClassifier::new(&config.sentiment_url, "POSITIVE", timeout)?;

        tracing::info!(
            transformer = %config.fake_transformer_url,
            recurrent = %config.fake_recurrent_url,
            sentiment = %config.sentiment_url,
            "analysis models configured"
        );

        Ok(Self {
            authenticity: AuthenticityScorer::new(Arc::new(transformer), Arc::new(recurrent)),
            sentiment: SentimentAggregator::new(Arc::new(sentiment)),
        })
    }
}
