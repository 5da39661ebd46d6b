//! Batch orchestration: extract, analyse, detect, persist and notify per link,
//! with every link isolated from the failures of the others.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use reputrack_core::{
    LinkAnalysis, LinkUpdate, Platform, Review, ScoreSnapshot, TrackedLink,
};
use reputrack_nlp::{AnalysisModels, NlpError};
use reputrack_scraper::ReviewSource;
use serde::Serialize;
use tokio::sync::watch;

use crate::detect::{detect, drop_annotation};
use crate::error::PipelineError;
use crate::notify::{Notifier, RatingDropAlert};
use crate::store::LinkStore;

const PANIC_NOTE: &str = "Error: link pipeline panicked";

/// How one link's pass ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// Reviews were scored and every snapshot field was written.
    Analyzed { reviews: usize, rating_dropped: bool },
    /// Extraction completed without reviews; only the note was written.
    NoReviews,
    /// Extraction failed; only the note was written.
    ExtractFailed { error: String },
    /// Classifiers failed; the rating was written but no scores.
    AnalyzeFailed { error: String, rating_dropped: bool },
    /// The link pipeline panicked; only the note was written.
    Panicked,
    /// The batch was cancelled before this link started; nothing was written.
    Cancelled,
}

impl LinkOutcome {
    #[must_use]
    pub fn rating_dropped(&self) -> bool {
        matches!(
            self,
            LinkOutcome::Analyzed { rating_dropped: true, .. }
                | LinkOutcome::AnalyzeFailed { rating_dropped: true, .. }
        )
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            LinkOutcome::ExtractFailed { .. }
                | LinkOutcome::AnalyzeFailed { .. }
                | LinkOutcome::Panicked
        )
    }
}

/// Result of one link's pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkReport {
    pub link_id: i64,
    pub outcome: LinkOutcome,
    /// Whether the link's update reached the store.
    pub persisted: bool,
    /// `None` when no alert was due; otherwise whether it was accepted.
    pub notified: Option<bool>,
}

/// Per-link reports of one batch, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub reports: Vec<LinkReport>,
}

impl BatchSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    #[must_use]
    pub fn analyzed(&self) -> usize {
        self.count(|o| matches!(o, LinkOutcome::Analyzed { .. }))
    }

    #[must_use]
    pub fn no_reviews(&self) -> usize {
        self.count(|o| matches!(o, LinkOutcome::NoReviews))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(LinkOutcome::is_failure)
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, LinkOutcome::Cancelled))
    }

    #[must_use]
    pub fn rating_drops(&self) -> usize {
        self.count(LinkOutcome::rating_dropped)
    }

    #[must_use]
    pub fn unpersisted(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| !r.persisted && r.outcome != LinkOutcome::Cancelled)
            .count()
    }

    #[must_use]
    pub fn report(&self, link_id: i64) -> Option<&LinkReport> {
        self.reports.iter().find(|r| r.link_id == link_id)
    }

    fn count(&self, pred: impl Fn(&LinkOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// The write and the alert one link's pass produced.
struct LinkPass {
    update: LinkUpdate,
    outcome: LinkOutcome,
    alert: Option<RatingDropAlert>,
}

/// Runs link pipelines against shared, read-only collaborators.
pub struct Orchestrator {
    source: Arc<dyn ReviewSource>,
    models: AnalysisModels,
    store: Arc<dyn LinkStore>,
    notifier: Arc<dyn Notifier>,
    platforms: Vec<Platform>,
    max_concurrent: usize,
    cancel: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    /// An orchestrator over every platform, one link at a time.
    #[must_use]
    pub fn new(
        source: Arc<dyn ReviewSource>,
        models: AnalysisModels,
        store: Arc<dyn LinkStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            models,
            store,
            notifier,
            platforms: Platform::ALL.to_vec(),
            max_concurrent: 1,
            cancel: None,
        }
    }

    /// Platforms [`Orchestrator::analyze_all`] processes.
    #[must_use]
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Number of links processed at once; at least one.
    #[must_use]
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Stop starting new links once `cancel` turns `true`. Links already in
    /// flight run to completion.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Analyse one link immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::LinkNotFound`] if the link does not exist, or
    /// [`PipelineError::Store`] if it cannot be read. Failures inside the
    /// link's pass are reported in the summary.
    pub async fn analyze_link(&self, link_id: i64) -> Result<BatchSummary, PipelineError> {
        let link = self
            .store
            .get_link(link_id)
            .await?
            .ok_or(PipelineError::LinkNotFound(link_id))?;
        Ok(self.run_batch(vec![link]).await)
    }

    /// Analyse every link of one product, whatever its platform.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] if the links cannot be read.
    pub async fn analyze_product(&self, product_id: i64) -> Result<BatchSummary, PipelineError> {
        let links = self.store.links_for_product(product_id).await?;
        if links.is_empty() {
            tracing::warn!(product_id, "product has no tracked links");
        }
        Ok(self.run_batch(links).await)
    }

    /// Analyse every tracked link on the configured platforms.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] if the links cannot be read.
    pub async fn analyze_all(&self) -> Result<BatchSummary, PipelineError> {
        let links = self.store.links_on_platforms(&self.platforms).await?;
        Ok(self.run_batch(links).await)
    }

    /// Run every link's pass, up to `max_concurrent` at a time.
    ///
    /// Never fails: each link's outcome is in the returned summary.
    pub async fn run_batch(&self, links: Vec<TrackedLink>) -> BatchSummary {
        tracing::info!(
            links = links.len(),
            max_concurrent = self.max_concurrent,
            "starting analysis batch"
        );

        let reports: Vec<LinkReport> = stream::iter(links)
            .map(|link| async move { self.process_link(&link).await })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        let summary = BatchSummary { reports };

        tracing::info!(
            total = summary.total(),
            analyzed = summary.analyzed(),
            no_reviews = summary.no_reviews(),
            failed = summary.failed(),
            cancelled = summary.cancelled(),
            rating_drops = summary.rating_drops(),
            unpersisted = summary.unpersisted(),
            "analysis batch complete"
        );
        summary
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn process_link(&self, link: &TrackedLink) -> LinkReport {
        if self.is_cancelled() {
            tracing::info!(link_id = link.id, "batch cancelled, link skipped");
            return LinkReport {
                link_id: link.id,
                outcome: LinkOutcome::Cancelled,
                persisted: false,
                notified: None,
            };
        }

        let pass = match AssertUnwindSafe(self.run_link(link)).catch_unwind().await {
            Ok(pass) => pass,
            Err(_) => {
                tracing::error!(link_id = link.id, url = %link.url, "link pipeline panicked");
                LinkPass {
                    update: LinkUpdate::note_only(link.id, PANIC_NOTE),
                    outcome: LinkOutcome::Panicked,
                    alert: None,
                }
            }
        };

        let persisted = match AssertUnwindSafe(self.store.apply_update(&pass.update))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(link_id = link.id, error = %e, "failed to persist link update");
                false
            }
            Err(_) => {
                tracing::error!(link_id = link.id, "link store panicked while persisting");
                false
            }
        };

        // An unpersisted drop is detected again on the next pass, so the alert
        // waits for it.
        let notified = match &pass.alert {
            Some(alert) if persisted => {
                match AssertUnwindSafe(self.notifier.notify(alert)).catch_unwind().await {
                    Ok(sent) => Some(sent),
                    Err(_) => {
                        tracing::error!(link_id = link.id, "notifier panicked");
                        Some(false)
                    }
                }
            }
            _ => None,
        };

        match &pass.outcome {
            LinkOutcome::Analyzed { reviews, .. } => tracing::info!(
                link_id = link.id,
                platform = %link.platform,
                reviews,
                note = %pass.update.note,
                "link analysed"
            ),
            LinkOutcome::NoReviews => {
                tracing::warn!(link_id = link.id, url = %link.url, note = %pass.update.note, "no reviews found");
            }
            outcome if outcome.is_failure() => {
                tracing::warn!(link_id = link.id, url = %link.url, note = %pass.update.note, "link failed");
            }
            _ => {}
        }

        LinkReport {
            link_id: link.id,
            outcome: pass.outcome,
            persisted,
            notified,
        }
    }

    async fn run_link(&self, link: &TrackedLink) -> LinkPass {
        tracing::debug!(link_id = link.id, url = %link.url, platform = %link.platform, "extracting");
        let extraction = self.source.extract(&link.url, link.platform).await;

        if let Some(error) = extraction.error {
            return LinkPass {
                update: LinkUpdate::note_only(link.id, error.clone()),
                outcome: LinkOutcome::ExtractFailed { error },
                alert: None,
            };
        }
        if extraction.reviews.is_empty() {
            let note = extraction
                .note
                .unwrap_or_else(|| "No reviews found on product page".to_string());
            return LinkPass {
                update: LinkUpdate::note_only(link.id, note),
                outcome: LinkOutcome::NoReviews,
                alert: None,
            };
        }

        let mut reviews = extraction.reviews;
        let analysis = self.analyze(&mut reviews).await;

        let rating_dropped = detect(link.last_rating, extraction.rating);
        let drop_suffix = match (rating_dropped, link.last_rating, extraction.rating) {
            (true, Some(old), Some(new)) => drop_annotation(old, new),
            _ => String::new(),
        };
        let alert = if rating_dropped {
            drop_alert(link, extraction.rating)
        } else {
            None
        };

        let count = reviews.len();
        let (note, analysis, outcome) = match analysis {
            Ok(scores) => (
                format!("Success: {count} reviews analyzed{drop_suffix}"),
                Some(LinkAnalysis { scores, reviews }),
                LinkOutcome::Analyzed {
                    reviews: count,
                    rating_dropped,
                },
            ),
            Err(e) => {
                let error = e.to_string();
                (
                    format!("Analysis failed: {error}{drop_suffix}"),
                    None,
                    LinkOutcome::AnalyzeFailed {
                        error,
                        rating_dropped,
                    },
                )
            }
        };

        LinkPass {
            update: LinkUpdate {
                link_id: link.id,
                rating: extraction.rating,
                scraped_at: Some(Utc::now()),
                analysis,
                note,
            },
            outcome,
            alert,
        }
    }

    /// Score authenticity, then sentiment. Either failing abandons both.
    async fn analyze(&self, reviews: &mut [Review]) -> Result<ScoreSnapshot, NlpError> {
        let fake_ratio = self.models.authenticity.score(reviews).await?;
        let (sentiment_score, sentiment_breakdown) =
            self.models.sentiment.aggregate(reviews).await?;
        Ok(ScoreSnapshot {
            fake_ratio,
            sentiment_score,
            sentiment_breakdown,
        })
    }
}

fn drop_alert(link: &TrackedLink, new_rating: Option<f64>) -> Option<RatingDropAlert> {
    let (Some(old_rating), Some(new_rating)) = (link.last_rating, new_rating) else {
        return None;
    };
    tracing::warn!(link_id = link.id, old_rating, new_rating, "rating drop detected");
    let Some(recipient) = link.owner_email.clone() else {
        tracing::warn!(link_id = link.id, "rating dropped but the owner has no e-mail address");
        return None;
    };
    Some(RatingDropAlert {
        recipient,
        product_name: link.product_name.clone(),
        old_rating,
        new_rating,
        product_url: link.url.clone(),
    })
}
