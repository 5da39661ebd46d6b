mod api;
mod middleware;
mod scheduler;
mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use reputrack_pipeline::{LinkStore, PgLinkStore};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
    tasks::BackgroundTasks,
};

/// Headroom past the navigation timeout for a link already in flight at
/// shutdown to finish its waits, analysis and write.
const DRAIN_MARGIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(reputrack_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = reputrack_db::PoolConfig::from_app_config(&config);
    let pool = reputrack_db::connect_pool(&config.database_url, pool_config).await?;
    reputrack_db::run_migrations(&pool).await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let orchestrator = Arc::new(
        reputrack_pipeline::build_orchestrator(&config, pool.clone())?
            .with_cancellation(cancel_rx),
    );

    let tasks = BackgroundTasks::default();
    let mut scheduler = scheduler::build_scheduler(
        Arc::clone(&orchestrator),
        tasks.clone(),
        &config.scrape_cron,
    )
    .await?;

    let auth = AuthState::from_config(&config)?;
    let store: Arc<dyn LinkStore> = Arc::new(PgLinkStore::new(pool.clone()));
    let app = build_app(
        AppState {
            pool,
            store,
            orchestrator,
            tasks: tasks.clone(),
        },
        auth,
    );

    tracing::info!(addr = %config.bind_addr, env = %config.env, "reputrack-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_tx))
        .await?;

    // Cancellation is already signalled: batches start no new links, so this
    // only waits for links that were mid-extraction.
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "failed to stop scheduler cleanly");
    }
    let limit = Duration::from_secs(config.navigation_timeout_secs) + DRAIN_MARGIN;
    let aborted = tasks.drain(limit).await;
    if aborted > 0 {
        tracing::warn!(batches = aborted, "shutdown cut off running analysis batches");
    }
    tracing::info!("reputrack-server stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM after telling running batches to stop
/// starting new links.
async fn shutdown_signal(cancel: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
    if cancel.send(true).is_err() {
        tracing::debug!("no batch is listening for cancellation");
    }
}
