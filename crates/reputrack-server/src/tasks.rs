//! Background analysis batches the server owns until shutdown.
//!
//! On-demand requests and the cron job both hand their batch here instead of
//! detaching it, so `main` can wait for links that are already in a browser
//! before the runtime goes away.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};

/// Time aborted batches get to release their browser sessions.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
    close_grace: Duration,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self {
            set: Arc::default(),
            close_grace: CLOSE_GRACE,
        }
    }
}

impl BackgroundTasks {
    /// Run `task` in the background and keep track of it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(done) = set.try_join_next() {
            log_failure(done);
        }
        set.spawn(task);
    }

    /// Wait up to `limit` for every tracked batch to finish.
    ///
    /// Batches still running at the limit are aborted, and given a short
    /// grace so their sessions close. Returns how many were aborted.
    pub async fn drain(&self, limit: Duration) -> usize {
        let mut set =
            std::mem::take(&mut *self.set.lock().unwrap_or_else(PoisonError::into_inner));
        if set.is_empty() {
            return 0;
        }
        tracing::info!(batches = set.len(), "waiting for running analysis batches");

        let finished = tokio::time::timeout(limit, async {
            while let Some(done) = set.join_next().await {
                log_failure(done);
            }
        })
        .await;
        if finished.is_ok() {
            return 0;
        }

        let aborted = set.len();
        tracing::warn!(
            batches = aborted,
            limit_secs = limit.as_secs(),
            "aborting analysis batches still running"
        );
        set.shutdown().await;
        tokio::time::sleep(self.close_grace).await;
        aborted
    }
}

fn log_failure(done: Result<(), JoinError>) {
    if let Err(e) = done {
        if e.is_panic() {
            tracing::error!(error = %e, "analysis batch panicked");
        }
    }
}
