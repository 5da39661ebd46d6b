//! The page extractor: one browser session per call, ordered strategy
//! chains per step, and a guaranteed session close on every exit path.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use rand::Rng;
use reputrack_core::{AppConfig, ExtractionResult, Platform, RatingScale};

use crate::browser::{BrowserLauncher, BrowserSession, SessionOptions};
use crate::error::ExtractError;
use crate::platforms::PlatformProfile;
use crate::retry::retry_with_backoff;
use crate::strategy::{click_first_present, first_containers, first_rating, StepTimeouts};

/// Anything that can turn a product URL into an [`ExtractionResult`].
///
/// Implementations never fail: every problem is reported through
/// [`ExtractionResult::error`].
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn extract(&self, url: &str, platform: Platform) -> ExtractionResult;
}

/// Timing and limits for extraction.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub headless: bool,
    pub navigation_timeout: Duration,
    pub element_timeout: Duration,
    pub selector_wait: Duration,
    /// Jittered pause after navigation, drawn from `settle_min..=settle_max`.
    pub settle_min: Duration,
    pub settle_max: Duration,
    /// Pause after scrolling, dismissing, or revealing so lazy content can render.
    pub interaction_pause: Duration,
    pub max_reviews: usize,
    pub session_retries: u32,
    pub session_retry_backoff_base_secs: u64,
    /// Overrides of each profile's default rating scale.
    pub rating_scales: HashMap<Platform, RatingScale>,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: Duration::from_secs(60),
            element_timeout: Duration::from_secs(5),
            selector_wait: Duration::from_secs(8),
            settle_min: Duration::from_secs(2),
            settle_max: Duration::from_secs(5),
            interaction_pause: Duration::from_secs(2),
            max_reviews: 10,
            session_retries: 2,
            session_retry_backoff_base_secs: 2,
            rating_scales: HashMap::new(),
        }
    }
}

impl ExtractorSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            headless: config.browser_headless,
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            element_timeout: Duration::from_millis(config.element_timeout_ms),
            selector_wait: Duration::from_millis(config.selector_wait_ms),
            settle_min: Duration::from_millis(config.settle_min_ms),
            settle_max: Duration::from_millis(config.settle_max_ms),
            max_reviews: config.max_reviews_per_link,
            session_retries: config.session_retries,
            session_retry_backoff_base_secs: config.session_retry_backoff_base_secs,
            rating_scales: config.rating_scales.clone(),
            ..Self::default()
        }
    }

    /// Same limits with every deliberate pause removed.
    #[must_use]
    pub fn without_pauses(mut self) -> Self {
        self.settle_min = Duration::ZERO;
        self.settle_max = Duration::ZERO;
        self.interaction_pause = Duration::ZERO;
        self.session_retry_backoff_base_secs = 0;
        self
    }

    fn timeouts(&self) -> StepTimeouts {
        StepTimeouts {
            element: self.element_timeout,
            selector_wait: self.selector_wait,
        }
    }

    fn settle_delay(&self) -> Duration {
        if self.settle_max <= self.settle_min {
            return self.settle_min;
        }
        let min = u64::try_from(self.settle_min.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.settle_max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Extracts ratings and reviews from product pages.
pub struct Extractor {
    launcher: Arc<dyn BrowserLauncher>,
    settings: ExtractorSettings,
    profiles: HashMap<Platform, PlatformProfile>,
}

impl Extractor {
    /// An extractor with the built-in profile for every platform.
    #[must_use]
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: ExtractorSettings) -> Self {
        let profiles = Platform::ALL
            .into_iter()
            .map(|p| (p, PlatformProfile::for_platform(p)))
            .collect();
        Self {
            launcher,
            settings,
            profiles,
        }
    }

    /// Replace the profile used for `profile.platform`.
    #[must_use]
    pub fn with_profile(mut self, profile: PlatformProfile) -> Self {
        self.profiles.insert(profile.platform, profile);
        self
    }

    /// Extract the overall rating and up to `max_reviews` reviews from `url`.
    ///
    /// Never fails; see [`ExtractionResult`] for how problems are reported.
    pub async fn extract(&self, url: &str, platform: Platform) -> ExtractionResult {
        let Some(profile) = self.profiles.get(&platform) else {
            return ExtractionResult::failed(
                ExtractError::UnsupportedPlatform(platform.to_string()).to_string(),
            );
        };

        let options = SessionOptions::randomized(self.settings.headless)
            .with_extra_headers(&profile.extra_headers)
            .with_page_load_timeout(self.settings.navigation_timeout);
        let opened = retry_with_backoff(
            self.settings.session_retries,
            self.settings.session_retry_backoff_base_secs,
            || self.launcher.open(&options),
        )
        .await;
        let session = match opened {
            Ok(session) => SessionGuard::new(session, url),
            Err(err) => {
                let err = ExtractError::SessionOpen(err);
                tracing::warn!(url, %platform, error = %err, "extraction aborted");
                return ExtractionResult::failed(err.to_string());
            }
        };

        let outcome = AssertUnwindSafe(self.run(session.get(), profile, url))
            .catch_unwind()
            .await;

        session.close().await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(url, %platform, error = %err, "extraction failed");
                ExtractionResult::failed(err.to_string())
            }
            Err(_) => {
                tracing::error!(url, %platform, "extraction panicked");
                ExtractionResult::failed(ExtractError::Panicked.to_string())
            }
        };

        if !result.is_error() {
            tracing::info!(
                url,
                %platform,
                rating = ?result.rating,
                reviews = result.reviews.len(),
                "extraction complete"
            );
        }
        result
    }

    async fn run(
        &self,
        session: &dyn BrowserSession,
        profile: &PlatformProfile,
        url: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        let timeouts = self.settings.timeouts();
        let pause = self.settings.interaction_pause;

        session
            .goto(url, self.settings.navigation_timeout)
            .await
            .map_err(|source| ExtractError::Navigation {
                url: url.to_string(),
                source,
            })?;
        tokio::time::sleep(self.settings.settle_delay()).await;

        if click_first_present(&profile.dismiss, session, &timeouts)
            .await?
            .is_some()
        {
            tokio::time::sleep(pause / 2).await;
        }

        let scale = self
            .settings
            .rating_scales
            .get(&profile.platform)
            .copied()
            .unwrap_or(profile.default_scale);
        let rating = first_rating(&profile.rating, session, &timeouts, scale).await?;

        self.scroll_to_reviews(session, profile).await?;
        tokio::time::sleep(pause).await;

        let limit = self.settings.max_reviews;
        let mut candidates = first_containers(&profile.containers, session, &timeouts, limit).await?;
        if candidates.is_empty() {
            if let Some(control) = click_first_present(&profile.reveal, session, &timeouts).await? {
                tracing::debug!(url, locator = %control, "revealed more reviews, retrying discovery");
                tokio::time::sleep(pause).await;
                candidates = first_containers(&profile.containers, session, &timeouts, limit).await?;
            }
        }

        let mut reviews = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter().take(limit) {
            if let Some(review) = profile.fields.parse(session, candidate, &timeouts).await? {
                reviews.push(review);
            }
        }

        Ok(ExtractionResult::completed(rating, reviews))
    }

    async fn scroll_to_reviews(
        &self,
        session: &dyn BrowserSession,
        profile: &PlatformProfile,
    ) -> Result<(), ExtractError> {
        for target in &profile.scroll_targets {
            match session.find_all(target).await {
                Ok(found) => {
                    if let Some(section) = found.first() {
                        match session.scroll_into_view(section).await {
                            Ok(()) => return Ok(()),
                            Err(err) if err.is_fatal() => return Err(err.into()),
                            Err(err) => tracing::debug!(locator = %target, error = %err, "scroll into view failed"),
                        }
                    }
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => tracing::debug!(locator = %target, error = %err, "scroll target lookup failed"),
            }
        }
        match session.scroll_to_fraction(profile.scroll_fraction).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                tracing::debug!(error = %err, "fractional scroll failed");
                Ok(())
            }
        }
    }
}

/// Owns an open session for the length of one extraction.
///
/// [`SessionGuard::close`] releases it on the normal path. If the extraction
/// future is dropped first (the task was aborted or a shutdown cut it off),
/// the guard hands the close to the runtime instead.
struct SessionGuard {
    session: Arc<dyn BrowserSession>,
    url: String,
    closed: bool,
}

impl SessionGuard {
    fn new(session: Box<dyn BrowserSession>, url: &str) -> Self {
        Self {
            session: Arc::from(session),
            url: url.to_string(),
            closed: false,
        }
    }

    fn get(&self) -> &dyn BrowserSession {
        self.session.as_ref()
    }

    async fn close(mut self) {
        if let Err(err) = self.session.close().await {
            tracing::warn!(url = %self.url, error = %err, "failed to close browser session");
        }
        self.closed = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let session = Arc::clone(&self.session);
        let url = std::mem::take(&mut self.url);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(url = %url, "extraction dropped mid-flight; closing browser session");
                handle.spawn(async move {
                    if let Err(err) = session.close().await {
                        tracing::warn!(url = %url, error = %err, "failed to close abandoned browser session");
                    }
                });
            }
            Err(_) => {
                tracing::error!(url = %url, "extraction dropped outside a runtime; browser session leaked");
            }
        }
    }
}

#[async_trait]
impl ReviewSource for Extractor {
    async fn extract(&self, url: &str, platform: Platform) -> ExtractionResult {
        Extractor::extract(self, url, platform).await
    }
}
