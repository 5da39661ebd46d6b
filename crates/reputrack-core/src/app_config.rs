use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::platform::{Platform, RatingScale};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub webdriver_url: String,
    pub browser_headless: bool,
    pub navigation_timeout_secs: u64,
    pub element_timeout_ms: u64,
    pub selector_wait_ms: u64,
    pub settle_min_ms: u64,
    pub settle_max_ms: u64,
    pub max_reviews_per_link: usize,
    pub max_concurrent_links: usize,
    pub session_retries: u32,
    pub session_retry_backoff_base_secs: u64,
    /// Platforms the scheduled batch processes.
    pub platforms: Vec<Platform>,
    /// Per-platform overrides of the profile's default rating scale.
    pub rating_scales: HashMap<Platform, RatingScale>,
    pub fake_transformer_url: String,
    pub fake_transformer_label: String,
    pub fake_recurrent_url: String,
    pub fake_recurrent_vocab: PathBuf,
    pub sentiment_url: String,
    pub classifier_timeout_secs: u64,
    pub resend_api_key: Option<String>,
    pub notify_from: String,
    pub scrape_cron: String,
    pub api_keys: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("webdriver_url", &self.webdriver_url)
            .field("browser_headless", &self.browser_headless)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("element_timeout_ms", &self.element_timeout_ms)
            .field("selector_wait_ms", &self.selector_wait_ms)
            .field("settle_min_ms", &self.settle_min_ms)
            .field("settle_max_ms", &self.settle_max_ms)
            .field("max_reviews_per_link", &self.max_reviews_per_link)
            .field("max_concurrent_links", &self.max_concurrent_links)
            .field("session_retries", &self.session_retries)
            .field(
                "session_retry_backoff_base_secs",
                &self.session_retry_backoff_base_secs,
            )
            .field("platforms", &self.platforms)
            .field("rating_scales", &self.rating_scales)
            .field("fake_transformer_url", &self.fake_transformer_url)
            .field("fake_transformer_label", &self.fake_transformer_label)
            .field("fake_recurrent_url", &self.fake_recurrent_url)
            .field("fake_recurrent_vocab", &self.fake_recurrent_vocab)
            .field("sentiment_url", &self.sentiment_url)
            .field("classifier_timeout_secs", &self.classifier_timeout_secs)
            .field(
                "resend_api_key",
                &self.resend_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("notify_from", &self.notify_from)
            .field("scrape_cron", &self.scrape_cron)
            .field("api_keys", &format!("[{} redacted]", self.api_keys.len()))
            .finish()
    }
}
