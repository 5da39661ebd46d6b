//! In-memory collaborators for driving the orchestrator without a browser,
//! a database, classifiers or an e-mail provider.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reputrack_core::{
    ExtractionResult, LinkUpdate, Platform, Review, SentimentLabel, TrackedLink,
};
use reputrack_nlp::{
    AnalysisModels, AuthenticityScorer, FakeProbabilityModel, NlpError, SentimentAggregator,
    SentimentModel, SentimentPrediction,
};
use reputrack_pipeline::{LinkStore, Notifier, Orchestrator, RatingDropAlert, StoreError};
use reputrack_scraper::ReviewSource;

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum Scripted {
    Returns(ExtractionResult),
    Panics,
}

/// Returns a fixed result per URL. Unknown URLs fail extraction.
#[derive(Default)]
pub struct ScriptedSource {
    pages: HashMap<String, Scripted>,
    latency: Duration,
    in_flight: AtomicUsize,
    /// Most extractions ever running at once.
    pub peak_in_flight: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn page(mut self, url: &str, result: ExtractionResult) -> Self {
        self.pages.insert(url.to_string(), Scripted::Returns(result));
        self
    }

    pub fn panicking(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), Scripted::Panics);
        self
    }

    /// Every extraction takes `latency` before answering.
    pub fn slow(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ReviewSource for ScriptedSource {
    async fn extract(&self, url: &str, _platform: Platform) -> ExtractionResult {
        self.calls.lock().unwrap().push(url.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(Scripted::Returns(result)) => result.clone(),
            Some(Scripted::Panics) => panic!("scripted panic for {url}"),
            None => ExtractionResult::failed(format!("no scripted page for {url}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

/// P(fake) looked up by normalised text, `0.1` for anything unknown.
#[derive(Default)]
pub struct KeyedFakeModel {
    probabilities: HashMap<String, f64>,
    pub calls: AtomicUsize,
    fail: bool,
}

impl KeyedFakeModel {
    pub fn with(mut self, normalised_text: &str, probability: f64) -> Self {
        self.probabilities
            .insert(normalised_text.to_string(), probability);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl FakeProbabilityModel for KeyedFakeModel {
    async fn fake_probabilities(&self, texts: &[String]) -> Result<Vec<f64>, NlpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NlpError::Status {
                service: "TEI",
                status: 503,
            });
        }
        Ok(texts
            .iter()
            .map(|t| self.probabilities.get(t).copied().unwrap_or(0.1))
            .collect())
    }
}

/// Positive with 0.9 confidence unless the raw text says otherwise.
#[derive(Default)]
pub struct KeyedSentimentModel {
    predictions: HashMap<String, SentimentPrediction>,
    pub calls: AtomicUsize,
}

impl KeyedSentimentModel {
    pub fn with(mut self, text: &str, label: SentimentLabel, confidence: f64) -> Self {
        self.predictions
            .insert(text.to_string(), SentimentPrediction { label, confidence });
        self
    }
}

#[async_trait]
impl SentimentModel for KeyedSentimentModel {
    async fn predict(&self, texts: &[String]) -> Result<Vec<SentimentPrediction>, NlpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                self.predictions.get(t).copied().unwrap_or(SentimentPrediction {
                    label: SentimentLabel::Positive,
                    confidence: 0.9,
                })
            })
            .collect())
    }
}

pub struct Models {
    pub transformer: Arc<KeyedFakeModel>,
    pub recurrent: Arc<KeyedFakeModel>,
    pub sentiment: Arc<KeyedSentimentModel>,
}

impl Models {
    /// Both authenticity models agree on every probability.
    pub fn agreeing(fake: KeyedFakeModel, twin: KeyedFakeModel) -> Self {
        Self {
            transformer: Arc::new(fake),
            recurrent: Arc::new(twin),
            sentiment: Arc::new(KeyedSentimentModel::default()),
        }
    }

    pub fn neutral() -> Self {
        Self::agreeing(KeyedFakeModel::default(), KeyedFakeModel::default())
    }

    pub fn analysis(&self) -> AnalysisModels {
        let transformer: Arc<dyn FakeProbabilityModel> = self.transformer.clone();
        let recurrent: Arc<dyn FakeProbabilityModel> = self.recurrent.clone();
        let sentiment: Arc<dyn SentimentModel> = self.sentiment.clone();
        AnalysisModels {
            authenticity: AuthenticityScorer::new(transformer, recurrent),
            sentiment: SentimentAggregator::new(sentiment),
        }
    }

    pub fn calls(&self) -> usize {
        self.transformer.calls.load(Ordering::SeqCst)
            + self.recurrent.calls.load(Ordering::SeqCst)
            + self.sentiment.calls.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    links: Mutex<BTreeMap<i64, TrackedLink>>,
    failing_writes: HashSet<i64>,
    panicking_writes: HashSet<i64>,
    pub writes: Mutex<Vec<LinkUpdate>>,
}

impl MemoryStore {
    pub fn with_links(links: Vec<TrackedLink>) -> Self {
        Self {
            links: Mutex::new(links.into_iter().map(|l| (l.id, l)).collect()),
            ..Self::default()
        }
    }

    pub fn failing_writes_for(mut self, link_id: i64) -> Self {
        self.failing_writes.insert(link_id);
        self
    }

    pub fn panicking_writes_for(mut self, link_id: i64) -> Self {
        self.panicking_writes.insert(link_id);
        self
    }

    pub fn link(&self, link_id: i64) -> TrackedLink {
        self.links.lock().unwrap()[&link_id].clone()
    }

    pub fn writes_for(&self, link_id: i64) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.link_id == link_id)
            .count()
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn get_link(&self, link_id: i64) -> Result<Option<TrackedLink>, StoreError> {
        Ok(self.links.lock().unwrap().get(&link_id).cloned())
    }

    async fn links_for_product(&self, product_id: i64) -> Result<Vec<TrackedLink>, StoreError> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn links_on_platforms(
        &self,
        platforms: &[Platform],
    ) -> Result<Vec<TrackedLink>, StoreError> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .values()
            .filter(|l| platforms.contains(&l.platform))
            .cloned()
            .collect())
    }

    async fn apply_update(&self, update: &LinkUpdate) -> Result<(), StoreError> {
        assert!(
            !self.panicking_writes.contains(&update.link_id),
            "scripted store panic for link {}",
            update.link_id
        );
        if self.failing_writes.contains(&update.link_id) {
            return Err(StoreError::LinkNotFound(update.link_id));
        }
        self.writes.lock().unwrap().push(update.clone());
        let mut links = self.links.lock().unwrap();
        let link = links
            .get_mut(&update.link_id)
            .ok_or(StoreError::LinkNotFound(update.link_id))?;
        link.apply(update);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<RatingDropAlert>>,
    accept: bool,
    panic: bool,
}

impl RecordingNotifier {
    pub fn accepting() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            accept: true,
            panic: false,
        }
    }

    pub fn refusing() -> Self {
        Self {
            accept: false,
            ..Self::accepting()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::accepting()
        }
    }

    pub fn sent(&self) -> Vec<RatingDropAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &RatingDropAlert) -> bool {
        assert!(!self.panic, "scripted notifier panic for {}", alert.product_name);
        self.alerts.lock().unwrap().push(alert.clone());
        self.accept
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn link(id: i64, platform: Platform, url: &str) -> TrackedLink {
    let mut link = TrackedLink::new(id, 100, format!("Product {id}"), platform, url);
    link.owner_email = Some("owner@example.com".to_string());
    link
}

pub fn reviews(texts: &[&str]) -> Vec<Review> {
    texts.iter().map(|t| Review::new(*t, 4)).collect()
}

pub fn orchestrator(
    source: &Arc<ScriptedSource>,
    models: &Models,
    store: &Arc<MemoryStore>,
    notifier: &Arc<RecordingNotifier>,
) -> Orchestrator {
    let source: Arc<dyn ReviewSource> = source.clone();
    let store: Arc<dyn LinkStore> = store.clone();
    let notifier: Arc<dyn Notifier> = notifier.clone();
    Orchestrator::new(source, models.analysis(), store, notifier)
}
