pub mod app_config;
pub mod config;
pub mod link;
pub mod platform;
pub mod review;

pub use app_config::{AppConfig, Environment};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use link::{LinkAnalysis, LinkUpdate, TrackedLink};
pub use platform::{Platform, RatingScale};
pub use review::{
    round3, Authenticity, ExtractionResult, Review, ScoreSnapshot, Sentiment, SentimentBreakdown,
    SentimentLabel, DEFAULT_STARS,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("invalid rating scale: {0} (expected five, clamp, out_of:N or adaptive:N)")]
    InvalidRatingScale(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
