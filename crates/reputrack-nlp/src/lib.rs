//! Review analysis for RepuTrack.
//!
//! Scores extracted reviews for authenticity with an ensemble of two fake-review
//! classifiers and labels their sentiment. Classifiers are remote inference
//! services (TEI and a model-serving predict endpoint) reached over HTTP.

pub mod analysis;
pub mod authenticity;
pub mod error;
pub mod model;
pub mod sentiment;
pub mod tei;
pub mod windowed;

pub use analysis::AnalysisModels;
pub use authenticity::AuthenticityScorer;
pub use error::NlpError;
pub use model::{FakeProbabilityModel, SentimentModel, SentimentPrediction};
pub use sentiment::SentimentAggregator;
pub use tei::TeiClassifier;
pub use windowed::{Vocabulary, WindowedClassifier};
