//! Ordered fallback chains for each extraction step.
//!
//! Every step (rating, review containers, body text, star count) is an
//! ordered list of independent strategies evaluated most-specific first.
//! The first strategy that yields a usable value wins. A strategy that
//! errors only disqualifies itself unless the error shows the session is
//! gone, in which case the chain stops and the error propagates.

use std::time::Duration;

use async_trait::async_trait;
use reputrack_core::{RatingScale, Review};

use crate::browser::{BrowserSession, ElementHandle, Locator};
use crate::error::BrowserError;
use crate::text::{
    bare_star_count, first_decimal, longest_line, page_text_rating, parse_star_count,
    strip_boilerplate,
};

/// Elements inspected per container strategy before giving up on it.
const SCAN_LIMIT: usize = 50;

/// Bounds applied to individual page reads.
#[derive(Debug, Clone, Copy)]
pub struct StepTimeouts {
    /// Reading one element's text, clicking, or reading page source.
    pub element: Duration,
    /// Waiting for a container locator to appear.
    pub selector_wait: Duration,
}

/// A page element that passed a container strategy's filter, with the text
/// that qualified it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub element: ElementHandle,
    pub text: String,
}

#[async_trait]
pub trait RatingStrategy: Send + Sync {
    fn describe(&self) -> String;

    /// Raw rating number as shown on the page, before scale normalisation.
    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        timeouts: &StepTimeouts,
    ) -> Result<Option<f64>, BrowserError>;
}

/// Read the first element matching a locator and take its first number.
pub struct LocatorRating(pub Locator);

#[async_trait]
impl RatingStrategy for LocatorRating {
    fn describe(&self) -> String {
        format!("locator {}", self.0)
    }

    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        timeouts: &StepTimeouts,
    ) -> Result<Option<f64>, BrowserError> {
        let found = session.find_all(&self.0).await?;
        let Some(first) = found.first() else {
            return Ok(None);
        };
        let text = session.inner_text(first, timeouts.element).await?;
        Ok(first_decimal(&text))
    }
}

/// Scan the whole page markup for a qualified rating number.
pub struct PageTextRating;

#[async_trait]
impl RatingStrategy for PageTextRating {
    fn describe(&self) -> String {
        "page text scan".to_string()
    }

    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        timeouts: &StepTimeouts,
    ) -> Result<Option<f64>, BrowserError> {
        let source = session.page_source(timeouts.element).await?;
        Ok(page_text_rating(&source))
    }
}

/// Run rating strategies in order and return the first value `scale` can
/// place on the 0-5 range.
///
/// # Errors
///
/// Returns the first fatal [`BrowserError`]; anything else just moves on to
/// the next strategy.
pub async fn first_rating(
    strategies: &[Box<dyn RatingStrategy>],
    session: &dyn BrowserSession,
    timeouts: &StepTimeouts,
    scale: RatingScale,
) -> Result<Option<f64>, BrowserError> {
    for strategy in strategies {
        let name = strategy.describe();
        match strategy.attempt(session, timeouts).await {
            Ok(Some(raw)) => match scale.normalize(raw) {
                Some(rating) => {
                    tracing::debug!(strategy = %name, raw, rating, "rating strategy matched");
                    return Ok(Some(rating));
                }
                None => {
                    tracing::debug!(strategy = %name, raw, ?scale, "rating outside scale, skipping");
                }
            },
            Ok(None) => tracing::debug!(strategy = %name, "rating strategy found nothing"),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => tracing::debug!(strategy = %name, error = %err, "rating strategy failed"),
        }
    }
    Ok(None)
}

#[async_trait]
pub trait ContainerStrategy: Send + Sync {
    fn describe(&self) -> String;

    /// Up to `limit` qualifying review containers, in page order.
    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        timeouts: &StepTimeouts,
        limit: usize,
    ) -> Result<Vec<Candidate>, BrowserError>;
}

/// Containers matched by a locator whose text is longer than `min_chars`.
pub struct SelectorContainers {
    pub locator: Locator,
    pub min_chars: usize,
}

impl SelectorContainers {
    #[must_use]
    pub fn css(selector: &str, min_chars: usize) -> Self {
        Self {
            locator: Locator::css(selector),
            min_chars,
        }
    }
}

#[async_trait]
impl ContainerStrategy for SelectorContainers {
    fn describe(&self) -> String {
        format!("containers {} (>{} chars)", self.locator, self.min_chars)
    }

    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        timeouts: &StepTimeouts,
        limit: usize,
    ) -> Result<Vec<Candidate>, BrowserError> {
        if !session.wait_for(&self.locator, timeouts.selector_wait).await? {
            return Ok(Vec::new());
        }
        let elements = session.find_all(&self.locator).await?;
        collect_candidates(session, elements, timeouts, limit, |text| {
            text.chars().count() > self.min_chars
        })
        .await
    }
}

/// Generic last-resort containers: anything matched by `locator` whose
/// text carries one of `markers` and has a plausible review length.
pub struct MarkedContainers {
    pub locator: Locator,
    pub markers: Vec<&'static str>,
    pub min_chars: usize,
    pub max_chars: usize,
}

#[async_trait]
impl ContainerStrategy for MarkedContainers {
    fn describe(&self) -> String {
        format!("marked containers {} {:?}", self.locator, self.markers)
    }

    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        timeouts: &StepTimeouts,
        limit: usize,
    ) -> Result<Vec<Candidate>, BrowserError> {
        let elements = session.find_all(&self.locator).await?;
        collect_candidates(session, elements, timeouts, limit, |text| {
            let len = text.chars().count();
            len > self.min_chars
                && len < self.max_chars
                && self.markers.iter().any(|m| text.contains(m))
        })
        .await
    }
}

async fn collect_candidates<F>(
    session: &dyn BrowserSession,
    elements: Vec<ElementHandle>,
    timeouts: &StepTimeouts,
    limit: usize,
    accept: F,
) -> Result<Vec<Candidate>, BrowserError>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    let mut accepted = Vec::new();
    for element in elements.into_iter().take(SCAN_LIMIT) {
        if accepted.len() >= limit {
            break;
        }
        match session.inner_text(&element, timeouts.element).await {
            Ok(text) => {
                let text = text.trim().to_string();
                if accept(&text) {
                    accepted.push(Candidate { element, text });
                }
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => tracing::debug!(error = %err, "skipping unreadable container"),
        }
    }
    Ok(accepted)
}

/// Run container strategies in order and return the first non-empty set.
///
/// # Errors
///
/// Returns the first fatal [`BrowserError`].
pub async fn first_containers(
    strategies: &[Box<dyn ContainerStrategy>],
    session: &dyn BrowserSession,
    timeouts: &StepTimeouts,
    limit: usize,
) -> Result<Vec<Candidate>, BrowserError> {
    for strategy in strategies {
        let name = strategy.describe();
        match strategy.attempt(session, timeouts, limit).await {
            Ok(found) if !found.is_empty() => {
                tracing::debug!(strategy = %name, count = found.len(), "container strategy matched");
                return Ok(found);
            }
            Ok(_) => tracing::debug!(strategy = %name, "container strategy found nothing"),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::debug!(strategy = %name, error = %err, "container strategy failed");
            }
        }
    }
    Ok(Vec::new())
}

/// Click the first of `controls` present on the page.
///
/// Returns the locator that was clicked, or `None` when no control was
/// present or clickable.
///
/// # Errors
///
/// Returns the first fatal [`BrowserError`].
pub async fn click_first_present<'a>(
    controls: &'a [Locator],
    session: &dyn BrowserSession,
    timeouts: &StepTimeouts,
) -> Result<Option<&'a Locator>, BrowserError> {
    for control in controls {
        let found = match session.find_all(control).await {
            Ok(found) => found,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::debug!(locator = %control, error = %err, "control lookup failed");
                continue;
            }
        };
        let Some(element) = found.first() else {
            continue;
        };
        match session.click(element, timeouts.element).await {
            Ok(()) => {
                tracing::debug!(locator = %control, "clicked control");
                return Ok(Some(control));
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => tracing::debug!(locator = %control, error = %err, "control click failed"),
        }
    }
    Ok(None)
}

/// Where the review body comes from inside a container.
#[derive(Debug, Clone)]
pub enum BodySource {
    /// Full text of the first descendant matching the locator.
    Within(Locator),
    /// Longest line of the container's own text.
    LongestLine,
}

/// Where the per-review star count comes from.
#[derive(Debug, Clone)]
pub enum StarSource {
    /// Star pattern (or bare number) in the first descendant matching the locator.
    Within(Locator),
    /// Number of `filled` icons inside the first `widget` descendant.
    FilledIcons { widget: Locator, filled: Locator },
    /// Star pattern anywhere in the container's own text.
    ContainerText,
}

/// How one container becomes a [`Review`].
#[derive(Debug, Clone)]
pub struct ReviewFields {
    pub body: Vec<BodySource>,
    pub stars: Vec<StarSource>,
    /// Cleaned bodies must be longer than this many characters.
    pub min_chars: usize,
    pub default_stars: u8,
}

impl ReviewFields {
    /// Turn `candidate` into a review, or `None` when its cleaned body is
    /// too short.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`BrowserError`].
    pub async fn parse(
        &self,
        session: &dyn BrowserSession,
        candidate: &Candidate,
        timeouts: &StepTimeouts,
    ) -> Result<Option<Review>, BrowserError> {
        let Some(raw_body) = self.body_text(session, candidate, timeouts).await? else {
            return Ok(None);
        };
        let body = strip_boilerplate(&raw_body);
        if body.chars().count() <= self.min_chars {
            return Ok(None);
        }
        let stars = self
            .star_count(session, candidate, timeouts)
            .await?
            .unwrap_or(self.default_stars);
        Ok(Some(Review::new(body, stars)))
    }

    async fn body_text(
        &self,
        session: &dyn BrowserSession,
        candidate: &Candidate,
        timeouts: &StepTimeouts,
    ) -> Result<Option<String>, BrowserError> {
        for source in &self.body {
            let text = match source {
                BodySource::LongestLine => longest_line(&candidate.text).map(str::to_string),
                BodySource::Within(locator) => {
                    first_text_within(session, &candidate.element, locator, timeouts).await?
                }
            };
            if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
                return Ok(Some(text.trim().to_string()));
            }
        }
        Ok(None)
    }

    async fn star_count(
        &self,
        session: &dyn BrowserSession,
        candidate: &Candidate,
        timeouts: &StepTimeouts,
    ) -> Result<Option<u8>, BrowserError> {
        for source in &self.stars {
            let stars = match source {
                StarSource::ContainerText => parse_star_count(&candidate.text),
                StarSource::Within(locator) => {
                    first_text_within(session, &candidate.element, locator, timeouts)
                        .await?
                        .and_then(|t| parse_star_count(&t).or_else(|| bare_star_count(&t)))
                }
                StarSource::FilledIcons { widget, filled } => {
                    count_filled(session, &candidate.element, widget, filled).await?
                }
            };
            if stars.is_some() {
                return Ok(stars);
            }
        }
        Ok(None)
    }
}

async fn first_text_within(
    session: &dyn BrowserSession,
    container: &ElementHandle,
    locator: &Locator,
    timeouts: &StepTimeouts,
) -> Result<Option<String>, BrowserError> {
    let found = match session.find_within(container, locator).await {
        Ok(found) => found,
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => return Ok(None),
    };
    let Some(first) = found.first() else {
        return Ok(None);
    };
    match session.inner_text(first, timeouts.element).await {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.is_fatal() => Err(err),
        Err(_) => Ok(None),
    }
}

async fn count_filled(
    session: &dyn BrowserSession,
    container: &ElementHandle,
    widget: &Locator,
    filled: &Locator,
) -> Result<Option<u8>, BrowserError> {
    let widgets = match session.find_within(container, widget).await {
        Ok(found) => found,
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => return Ok(None),
    };
    let Some(first) = widgets.first() else {
        return Ok(None);
    };
    let icons = match session.find_within(first, filled).await {
        Ok(found) => found,
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => return Ok(None),
    };
    Ok(u8::try_from(icons.len())
        .ok()
        .filter(|n| (1..=5).contains(n)))
}
