//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring review-analysis batch.

use std::sync::Arc;

use reputrack_pipeline::Orchestrator;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::tasks::BackgroundTasks;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Each batch runs on `tasks`, so shutdown
/// can wait for it.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// `schedule` is not a valid cron expression, or the scheduler fails to start.
pub async fn build_scheduler(
    orchestrator: Arc<Orchestrator>,
    tasks: BackgroundTasks,
    schedule: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_batch_job(&scheduler, orchestrator, tasks, schedule).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the batch over every tracked link on the configured platforms.
///
/// A tick that fires while the previous batch is still running is skipped.
async fn register_batch_job(
    scheduler: &JobScheduler,
    orchestrator: Arc<Orchestrator>,
    tasks: BackgroundTasks,
    schedule: &str,
) -> Result<(), JobSchedulerError> {
    let running = Arc::new(Mutex::new(()));

    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);
        let running = Arc::clone(&running);
        let tasks = tasks.clone();

        Box::pin(async move {
            let Ok(guard) = running.try_lock_owned() else {
                tracing::warn!("scheduler: previous analysis batch still running; skipping");
                return;
            };
            tracing::info!("scheduler: starting analysis batch");
            tasks.spawn(async move {
                run_batch_job(&orchestrator).await;
                drop(guard);
            });
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(schedule, "scheduler: analysis batch registered");
    Ok(())
}

async fn run_batch_job(orchestrator: &Orchestrator) {
    match orchestrator.analyze_all().await {
        Ok(summary) => tracing::info!(
            total = summary.total(),
            analyzed = summary.analyzed(),
            no_reviews = summary.no_reviews(),
            failed = summary.failed(),
            cancelled = summary.cancelled(),
            rating_drops = summary.rating_drops(),
            unpersisted = summary.unpersisted(),
            "scheduler: analysis batch complete"
        ),
        Err(e) => tracing::error!(error = %e, "scheduler: failed to load tracked links"),
    }
}
