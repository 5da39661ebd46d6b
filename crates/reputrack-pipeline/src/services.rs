//! Wiring of the production collaborators from [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use reputrack_core::AppConfig;
use reputrack_nlp::AnalysisModels;
use reputrack_scraper::{BrowserLauncher, Extractor, ExtractorSettings, WebDriverLauncher};
use sqlx::PgPool;

use crate::error::PipelineError;
use crate::notify::{DisabledNotifier, Notifier, ResendNotifier};
use crate::orchestrator::Orchestrator;
use crate::store::{LinkStore, PgLinkStore};

/// The page extractor driving the configured WebDriver endpoint.
///
/// # Errors
///
/// Returns [`PipelineError::Browser`] if the WebDriver client cannot be built.
pub fn build_extractor(config: &AppConfig) -> Result<Extractor, PipelineError> {
    let launcher: Arc<dyn BrowserLauncher> = Arc::new(WebDriverLauncher::new(
        &config.webdriver_url,
        Duration::from_secs(config.navigation_timeout_secs),
    )?);
    Ok(Extractor::new(launcher, ExtractorSettings::from_config(config)))
}

/// Resend when an API key is configured, otherwise a notifier that only logs.
///
/// # Errors
///
/// Returns [`PipelineError::Notifier`] if the HTTP client cannot be built.
pub fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>, PipelineError> {
    match &config.resend_api_key {
        Some(key) => Ok(Arc::new(ResendNotifier::new(key, &config.notify_from)?)),
        None => {
            tracing::warn!("RESEND_API_KEY is not set; rating drop alerts are disabled");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}

/// An orchestrator over Postgres with every production collaborator.
///
/// # Errors
///
/// Returns [`PipelineError`] if any collaborator cannot be constructed.
pub fn build_orchestrator(config: &AppConfig, pool: PgPool) -> Result<Orchestrator, PipelineError> {
    let store: Arc<dyn LinkStore> = Arc::new(PgLinkStore::new(pool));
    build_orchestrator_with_store(config, store)
}

/// As [`build_orchestrator`], with a caller-supplied store.
///
/// # Errors
///
/// Returns [`PipelineError`] if any collaborator cannot be constructed.
pub fn build_orchestrator_with_store(
    config: &AppConfig,
    store: Arc<dyn LinkStore>,
) -> Result<Orchestrator, PipelineError> {
    let extractor = Arc::new(build_extractor(config)?);
    let models = AnalysisModels::from_config(config)?;
    let notifier = build_notifier(config)?;

    Ok(Orchestrator::new(extractor, models, store, notifier)
        .with_platforms(config.platforms.clone())
        .with_concurrency(config.max_concurrent_links))
}
