//! Per-link review analysis pipeline for RepuTrack.
//!
//! The [`Orchestrator`] drives each tracked link through extraction,
//! authenticity scoring, sentiment aggregation and rating-drop detection, then
//! records exactly one update per link and sends best-effort alerts.

pub mod detect;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod services;
pub mod store;

pub use detect::{detect, drop_annotation, DROP_THRESHOLD};
pub use error::{NotifyError, PipelineError, StoreError};
pub use notify::{DisabledNotifier, Notifier, RatingDropAlert, ResendNotifier};
pub use orchestrator::{BatchSummary, LinkOutcome, LinkReport, Orchestrator};
pub use services::{build_extractor, build_notifier, build_orchestrator, build_orchestrator_with_store};
pub use store::{LinkStore, PgLinkStore};
