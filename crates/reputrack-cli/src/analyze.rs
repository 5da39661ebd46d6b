//! `analyze` command handlers.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Subcommand;
use reputrack_core::{AppConfig, LinkUpdate, Platform, TrackedLink};
use reputrack_pipeline::{BatchSummary, LinkStore, PgLinkStore, StoreError};
use tokio::sync::watch;

/// Sub-commands available under `analyze`.
#[derive(Debug, Subcommand)]
pub enum AnalyzeCommands {
    /// Analyse one tracked link now
    Link {
        #[arg(long)]
        id: i64,

        /// Run the pipeline but print updates instead of writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Analyse every link of one product
    Product {
        #[arg(long)]
        id: i64,

        /// Run the pipeline but print updates instead of writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Analyse every tracked link on the configured platforms
    All {
        /// Run the pipeline but print updates instead of writing them
        #[arg(long)]
        dry_run: bool,
    },
}

impl AnalyzeCommands {
    fn dry_run(&self) -> bool {
        match self {
            AnalyzeCommands::Link { dry_run, .. }
            | AnalyzeCommands::Product { dry_run, .. }
            | AnalyzeCommands::All { dry_run } => *dry_run,
        }
    }
}

/// Reads from Postgres and prints every update instead of writing it.
struct DryRunStore {
    inner: PgLinkStore,
}

#[async_trait]
impl LinkStore for DryRunStore {
    async fn get_link(&self, link_id: i64) -> Result<Option<TrackedLink>, StoreError> {
        self.inner.get_link(link_id).await
    }

    async fn links_for_product(&self, product_id: i64) -> Result<Vec<TrackedLink>, StoreError> {
        self.inner.links_for_product(product_id).await
    }

    async fn links_on_platforms(
        &self,
        platforms: &[Platform],
    ) -> Result<Vec<TrackedLink>, StoreError> {
        self.inner.links_on_platforms(platforms).await
    }

    async fn apply_update(&self, update: &LinkUpdate) -> Result<(), StoreError> {
        match serde_json::to_string_pretty(update) {
            Ok(json) => println!("dry-run: would write\n{json}"),
            Err(e) => println!("dry-run: would write link {} ({e})", update.link_id),
        }
        Ok(())
    }
}

/// Run the pipeline for the selected links and print a summary.
///
/// Ctrl-C stops new links from starting; links already in flight finish.
///
/// # Errors
///
/// Returns an error if a collaborator cannot be built, the links cannot be
/// read, or every processed link failed.
pub(crate) async fn run_analyze(
    config: &AppConfig,
    pool: sqlx::PgPool,
    command: AnalyzeCommands,
) -> anyhow::Result<()> {
    let store: Arc<dyn LinkStore> = if command.dry_run() {
        Arc::new(DryRunStore {
            inner: PgLinkStore::new(pool),
        })
    } else {
        Arc::new(PgLinkStore::new(pool))
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; no new links will be started");
            let _ = cancel_tx.send(true);
        }
    });

    let orchestrator = reputrack_pipeline::build_orchestrator_with_store(config, store)?
        .with_cancellation(cancel_rx);

    let summary = match command {
        AnalyzeCommands::Link { id, .. } => orchestrator.analyze_link(id).await?,
        AnalyzeCommands::Product { id, .. } => orchestrator.analyze_product(id).await?,
        AnalyzeCommands::All { .. } => orchestrator.analyze_all().await?,
    };

    print_summary(&summary);

    let attempted = summary.total() - summary.cancelled();
    if attempted > 0 && summary.failed() == attempted {
        anyhow::bail!("all {attempted} links failed analysis");
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    for report in &summary.reports {
        let outcome =
            serde_json::to_string(&report.outcome).unwrap_or_else(|_| format!("{:?}", report.outcome));
        println!(
            "link {:>6}  persisted={:<5}  {outcome}",
            report.link_id, report.persisted
        );
    }
    println!(
        "{} links: {} analysed, {} without reviews, {} failed, {} cancelled, {} rating drops",
        summary.total(),
        summary.analyzed(),
        summary.no_reviews(),
        summary.failed(),
        summary.cancelled(),
        summary.rating_drops()
    );
}
