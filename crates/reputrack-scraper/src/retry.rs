//! Retry with exponential backoff for opening browser sessions.
//!
//! Chromedriver occasionally refuses a new session under load or while a
//! previous browser is still shutting down. Those failures are transient;
//! protocol errors are not and are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::BrowserError;

/// Returns `true` if `err` is worth retrying after a delay.
///
/// Retriable errors:
/// - [`BrowserError::Http`]: the driver endpoint was unreachable.
/// - [`BrowserError::SessionNotCreated`]: the driver could not start a browser.
///
/// A [`BrowserError::Timeout`] is final: the driver may still be starting the
/// browser it was asked for, and a second request would start another one.
fn is_retriable(err: &BrowserError) -> bool {
    matches!(
        err,
        BrowserError::Http(_) | BrowserError::SessionNotCreated { .. }
    )
}

/// Runs `operation` once, then again after each transient failure, at most
/// `max_retries` more times.
///
/// Retry `n` (1-based) waits `backoff_base_secs * 2^(n-1)` seconds.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, BrowserError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrowserError>>,
{
    let mut retries = 0u32;
    let mut delay = Duration::from_secs(backoff_base_secs);

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retriable(&err) && retries < max_retries => err,
            Err(err) => return Err(err),
        };
        retries += 1;
        tracing::warn!(
            retry = retries,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "could not open browser session; backing off"
        );
        tokio::time::sleep(delay).await;
        delay = delay.saturating_mul(2);
    }
}
