//! Periodic expiry sweeping.

use std::sync::Arc;
use std::time::Duration;

use super::{CacheBackend, JOB_PREFIX, PAGE_PREFIX};

/// Run the expiry sweeper until the task is dropped.
///
/// Each cycle calls `cleanup` once per root prefix, so the embedded
/// backend holds at most one write transaction per root per cycle.
/// In-flight requests are never cancelled by a sweep.
pub async fn run(cache: Arc<dyn CacheBackend>, interval: Duration) {
    tracing::debug!(interval_secs = interval.as_secs(), "cache sweeper started");
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so a fresh boot is not a
    // sweep.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        tracing::debug!("cache sweep triggered");
        for root in [PAGE_PREFIX, JOB_PREFIX] {
            if let Err(err) = cache.cleanup(root).await {
                tracing::error!(root, error = %err, "cache sweep failed");
            }
        }
        tracing::debug!("cache sweep done");
    }
}
