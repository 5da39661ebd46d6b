//! Batch orchestration against in-memory collaborators.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{
    link, orchestrator, reviews, KeyedFakeModel, MemoryStore, Models, RecordingNotifier,
    ScriptedSource,
};
use reputrack_core::{ExtractionResult, Platform, SentimentBreakdown, SentimentLabel};
use reputrack_pipeline::{LinkOutcome, PipelineError};
use tokio::sync::watch;

const A: &str = "https://www.amazon.in/dp/A";
const B: &str = "https://www.flipkart.com/p/B";
const C: &str = "https://www.myntra.com/C";

#[tokio::test]
async fn drop_is_flagged_scored_persisted_and_notified() {
    let mut tracked = link(1, Platform::Amazon, A);
    tracked.last_rating = Some(4.8);
    let store = Arc::new(MemoryStore::with_links(vec![tracked]));
    let source = Arc::new(ScriptedSource::default().page(
        A,
        ExtractionResult::completed(
            Some(4.0),
            reviews(&["Too good to be true", "Decent blender", "Best ever buy now"]),
        ),
    ));
    let fake = || {
        KeyedFakeModel::default()
            .with("too good to be true", 0.9)
            .with("decent blender", 0.2)
            .with("best ever buy now", 0.6)
    };
    let models = Models::agreeing(fake(), fake());
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_link(1)
        .await
        .unwrap();

    let report = summary.report(1).unwrap();
    assert_eq!(
        report.outcome,
        LinkOutcome::Analyzed {
            reviews: 3,
            rating_dropped: true
        }
    );
    assert!(report.persisted);
    assert_eq!(report.notified, Some(true));

    let stored = store.link(1);
    assert_eq!(stored.last_rating, Some(4.0));
    assert_eq!(stored.fake_ratio, Some(0.667));
    assert_eq!(stored.sentiment_score, Some(1.0));
    assert_eq!(
        stored.sentiment_breakdown,
        Some(SentimentBreakdown {
            positive: 3,
            negative: 0,
            neutral: 0
        })
    );
    assert!(stored.reviews.iter().all(|r| r.is_fully_annotated()));
    assert_eq!(
        stored.scrape_note.as_deref(),
        Some("Success: 3 reviews analyzed | RATING DROPPED from 4.8 to 4.0")
    );
    assert!(stored.last_scraped_at.is_some());

    let alerts = notifier.sent();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].recipient, "owner@example.com");
    assert_eq!(alerts[0].old_rating, 4.8);
    assert_eq!(alerts[0].new_rating, 4.0);
    assert_eq!(alerts[0].product_url, A);
}

#[tokio::test]
async fn zero_reviews_keeps_previous_scores_and_records_note() {
    let mut tracked = link(1, Platform::Myntra, C);
    tracked.last_rating = Some(4.2);
    tracked.fake_ratio = Some(0.3);
    tracked.sentiment_score = Some(0.4);
    let store = Arc::new(MemoryStore::with_links(vec![tracked]));
    let source = Arc::new(ScriptedSource::default().page(C, ExtractionResult::completed(Some(3.0), vec![])));
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_link(1)
        .await
        .unwrap();

    assert_eq!(summary.report(1).unwrap().outcome, LinkOutcome::NoReviews);
    let stored = store.link(1);
    assert_eq!(stored.fake_ratio, Some(0.3));
    assert_eq!(stored.sentiment_score, Some(0.4));
    assert_eq!(stored.last_rating, Some(4.2));
    assert_eq!(
        stored.scrape_note.as_deref(),
        Some("No reviews found on product page")
    );
    assert_eq!(models.calls(), 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn extraction_error_never_reaches_the_classifiers() {
    let mut tracked = link(1, Platform::Amazon, A);
    tracked.last_rating = Some(4.5);
    let store = Arc::new(MemoryStore::with_links(vec![tracked]));
    let source = Arc::new(ScriptedSource::default().page(
        A,
        ExtractionResult::failed("navigation to https://www.amazon.in/dp/A failed: navigate timed out after 60000ms"),
    ));
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_link(1)
        .await
        .unwrap();

    assert!(matches!(
        summary.report(1).unwrap().outcome,
        LinkOutcome::ExtractFailed { .. }
    ));
    assert_eq!(models.calls(), 0);
    let stored = store.link(1);
    assert_eq!(
        stored.scrape_note.as_deref(),
        Some("navigation to https://www.amazon.in/dp/A failed: navigate timed out after 60000ms")
    );
    assert_eq!(stored.last_rating, Some(4.5));
}

#[tokio::test]
async fn one_failing_link_does_not_stop_the_batch() {
    let store = Arc::new(MemoryStore::with_links(vec![
        link(1, Platform::Amazon, A),
        link(2, Platform::Flipkart, B),
        link(3, Platform::Myntra, C),
    ]));
    let source = Arc::new(
        ScriptedSource::default()
            .page(A, ExtractionResult::completed(Some(4.1), reviews(&["Nice and sturdy"])))
            .panicking(B)
            .page(C, ExtractionResult::completed(Some(3.9), reviews(&["Colour faded fast"]))),
    );
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .with_concurrency(2)
        .analyze_all()
        .await
        .unwrap();

    assert_eq!(summary.total(), 3);
    assert_eq!(summary.analyzed(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.report(2).unwrap().outcome, LinkOutcome::Panicked);
    assert_eq!(
        store.link(2).scrape_note.as_deref(),
        Some("Error: link pipeline panicked")
    );
    for id in [1, 3] {
        let stored = store.link(id);
        assert_eq!(stored.reviews.len(), 1, "link {id}");
        assert!(stored.fake_ratio.is_some(), "link {id}");
    }
    for id in [1, 2, 3] {
        assert_eq!(store.writes_for(id), 1, "exactly one write for link {id}");
    }
}

#[tokio::test]
async fn extraction_error_on_middle_link_is_isolated() {
    let store = Arc::new(MemoryStore::with_links(vec![
        link(1, Platform::Amazon, A),
        link(2, Platform::Flipkart, B),
        link(3, Platform::Myntra, C),
    ]));
    let source = Arc::new(
        ScriptedSource::default()
            .page(A, ExtractionResult::completed(Some(4.1), reviews(&["Nice and sturdy"])))
            .page(B, ExtractionResult::failed("WebDriver transport error: connection refused"))
            .page(C, ExtractionResult::completed(Some(3.9), reviews(&["Colour faded fast"]))),
    );
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_all()
        .await
        .unwrap();

    assert_eq!(summary.analyzed(), 2);
    assert_eq!(
        store.link(2).scrape_note.as_deref(),
        Some("WebDriver transport error: connection refused")
    );
    assert_eq!(store.link(1).last_rating, Some(4.1));
    assert_eq!(store.link(3).last_rating, Some(3.9));
}

#[tokio::test]
async fn rerunning_identical_output_is_idempotent() {
    let mut tracked = link(1, Platform::Amazon, A);
    tracked.last_rating = Some(4.0);
    let store = Arc::new(MemoryStore::with_links(vec![tracked]));
    let source = Arc::new(ScriptedSource::default().page(
        A,
        ExtractionResult::completed(Some(4.0), reviews(&["Works as expected", "Arrived late"])),
    ));
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());
    let orchestrator = orchestrator(&source, &models, &store, &notifier);

    orchestrator.analyze_all().await.unwrap();
    let first = store.link(1);
    orchestrator.analyze_all().await.unwrap();
    let second = store.link(1);

    assert_eq!(first.reviews, second.reviews);
    assert_eq!(second.reviews.len(), 2);
    assert_eq!(first.fake_ratio, second.fake_ratio);
    assert_eq!(first.sentiment_score, second.sentiment_score);
    assert_eq!(first.sentiment_breakdown, second.sentiment_breakdown);
    assert_eq!(first.scrape_note, second.scrape_note);
    assert_eq!(first.last_rating, second.last_rating);
}

#[tokio::test]
async fn analysis_failure_keeps_rating_but_not_scores() {
    let mut tracked = link(1, Platform::Snapdeal, A);
    tracked.last_rating = Some(4.6);
    tracked.fake_ratio = Some(0.5);
    let store = Arc::new(MemoryStore::with_links(vec![tracked]));
    let source = Arc::new(ScriptedSource::default().page(
        A,
        ExtractionResult::completed(Some(3.5), reviews(&["Handle broke quickly"])),
    ));
    let models = Models::agreeing(KeyedFakeModel::default(), KeyedFakeModel::failing());
    let notifier = Arc::new(RecordingNotifier::refusing());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_link(1)
        .await
        .unwrap();

    let report = summary.report(1).unwrap();
    assert!(matches!(
        report.outcome,
        LinkOutcome::AnalyzeFailed { rating_dropped: true, .. }
    ));
    assert_eq!(report.notified, Some(false), "refused alert is reported, not raised");
    assert!(report.persisted);

    let stored = store.link(1);
    assert_eq!(stored.last_rating, Some(3.5));
    assert_eq!(stored.fake_ratio, Some(0.5));
    assert!(stored.reviews.is_empty());
    let note = stored.scrape_note.unwrap();
    assert!(note.starts_with("Analysis failed: TEI returned status 503"), "got: {note}");
    assert!(note.ends_with(" | RATING DROPPED from 4.6 to 3.5"), "got: {note}");
}

#[tokio::test]
async fn missing_new_rating_keeps_stored_rating_and_never_alerts() {
    let mut tracked = link(1, Platform::Amazon, A);
    tracked.last_rating = Some(4.7);
    let store = Arc::new(MemoryStore::with_links(vec![tracked]));
    let source = Arc::new(
        ScriptedSource::default().page(A, ExtractionResult::completed(None, reviews(&["Fine product"]))),
    );
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    orchestrator(&source, &models, &store, &notifier)
        .analyze_link(1)
        .await
        .unwrap();

    assert_eq!(store.link(1).last_rating, Some(4.7));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn failed_write_is_reported_and_suppresses_the_alert() {
    let mut tracked = link(1, Platform::Amazon, A);
    tracked.last_rating = Some(4.9);
    let store = Arc::new(MemoryStore::with_links(vec![tracked]).failing_writes_for(1));
    let source = Arc::new(
        ScriptedSource::default().page(A, ExtractionResult::completed(Some(3.0), reviews(&["Meh quality"]))),
    );
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_link(1)
        .await
        .unwrap();

    let report = summary.report(1).unwrap();
    assert!(!report.persisted);
    assert_eq!(report.notified, None);
    assert_eq!(summary.unpersisted(), 1);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn low_confidence_sentiment_is_neutral_in_the_snapshot() {
    let store = Arc::new(MemoryStore::with_links(vec![link(1, Platform::Amazon, A)]));
    let source = Arc::new(ScriptedSource::default().page(
        A,
        ExtractionResult::completed(Some(4.0), reviews(&["Love it", "Hate it", "It is okay"])),
    ));
    let mut models = Models::neutral();
    models.sentiment = Arc::new(
        common::KeyedSentimentModel::default()
            .with("Hate it", SentimentLabel::Negative, 0.95)
            .with("It is okay", SentimentLabel::Positive, 0.55),
    );
    let notifier = Arc::new(RecordingNotifier::accepting());

    orchestrator(&source, &models, &store, &notifier)
        .analyze_link(1)
        .await
        .unwrap();

    let stored = store.link(1);
    assert_eq!(
        stored.sentiment_breakdown,
        Some(SentimentBreakdown {
            positive: 1,
            negative: 1,
            neutral: 1
        })
    );
    assert_eq!(stored.sentiment_score, Some(0.0));
    assert_eq!(
        stored.reviews[2].sentiment.map(|s| s.label),
        Some(SentimentLabel::Positive)
    );
}

#[tokio::test]
async fn analyze_all_only_visits_configured_platforms() {
    let store = Arc::new(MemoryStore::with_links(vec![
        link(1, Platform::Amazon, A),
        link(2, Platform::Flipkart, B),
    ]));
    let source = Arc::new(
        ScriptedSource::default()
            .page(A, ExtractionResult::completed(Some(4.0), reviews(&["Solid build"])))
            .page(B, ExtractionResult::completed(Some(4.0), reviews(&["Solid build"]))),
    );
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .with_platforms(vec![Platform::Flipkart])
        .analyze_all()
        .await
        .unwrap();

    assert_eq!(summary.total(), 1);
    assert_eq!(*source.calls.lock().unwrap(), vec![B.to_string()]);
}

#[tokio::test]
async fn analyze_product_covers_each_of_its_links() {
    let mut other = link(3, Platform::Amazon, C);
    other.product_id = 200;
    let store = Arc::new(MemoryStore::with_links(vec![
        link(1, Platform::Amazon, A),
        link(2, Platform::Meesho, B),
        other,
    ]));
    let source = Arc::new(ScriptedSource::default());
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_product(100)
        .await
        .unwrap();

    let mut ids: Vec<i64> = summary.reports.iter().map(|r| r.link_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn unknown_link_is_an_error() {
    let store = Arc::new(MemoryStore::default());
    let source = Arc::new(ScriptedSource::default());
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let err = orchestrator(&source, &models, &store, &notifier)
        .analyze_link(42)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::LinkNotFound(42)));
}

#[tokio::test]
async fn cancelled_batch_starts_no_new_links() {
    let store = Arc::new(MemoryStore::with_links(vec![
        link(1, Platform::Amazon, A),
        link(2, Platform::Flipkart, B),
    ]));
    let source = Arc::new(ScriptedSource::default());
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());
    let (cancel, cancelled) = watch::channel(false);
    cancel.send(true).unwrap();

    let summary = orchestrator(&source, &models, &store, &notifier)
        .with_cancellation(cancelled)
        .analyze_all()
        .await
        .unwrap();

    assert_eq!(summary.cancelled(), 2);
    assert!(source.calls.lock().unwrap().is_empty());
    assert!(store.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn batch_never_exceeds_its_concurrency_bound() {
    let links: Vec<_> = (1..=6)
        .map(|id| link(id, Platform::Amazon, &format!("https://www.amazon.in/dp/{id}")))
        .collect();
    let store = Arc::new(MemoryStore::with_links(links.clone()));
    let source = Arc::new(ScriptedSource::default().slow(Duration::from_millis(50)));
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .with_concurrency(2)
        .run_batch(links)
        .await;

    assert_eq!(summary.total(), 6);
    assert_eq!(source.calls.lock().unwrap().len(), 6);
    assert_eq!(source.peak_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn panicking_store_fails_only_its_own_link() {
    let store = Arc::new(
        MemoryStore::with_links(vec![link(1, Platform::Amazon, A), link(2, Platform::Flipkart, B)])
            .panicking_writes_for(1),
    );
    let source = Arc::new(
        ScriptedSource::default()
            .page(A, ExtractionResult::completed(Some(4.1), reviews(&["Nice and sturdy"])))
            .page(B, ExtractionResult::completed(Some(3.9), reviews(&["Colour faded fast"]))),
    );
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::accepting());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_all()
        .await
        .unwrap();

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.unpersisted(), 1);
    assert!(!summary.report(1).unwrap().persisted);
    assert!(summary.report(2).unwrap().persisted);
    assert_eq!(store.writes_for(2), 1);
}

#[tokio::test]
async fn panicking_notifier_counts_as_undelivered() {
    let mut tracked = link(1, Platform::Amazon, A);
    tracked.last_rating = Some(4.8);
    let store = Arc::new(MemoryStore::with_links(vec![tracked]));
    let source = Arc::new(
        ScriptedSource::default().page(A, ExtractionResult::completed(Some(3.5), reviews(&["Broke in a week"]))),
    );
    let models = Models::neutral();
    let notifier = Arc::new(RecordingNotifier::panicking());

    let summary = orchestrator(&source, &models, &store, &notifier)
        .analyze_link(1)
        .await
        .unwrap();

    let report = summary.report(1).unwrap();
    assert!(report.persisted);
    assert_eq!(report.notified, Some(false));
    assert_eq!(store.link(1).last_rating, Some(3.5));
}
