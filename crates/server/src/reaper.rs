//! Background sweep of leftover archives in the scratch directory.

use std::sync::Arc;
use std::time::Duration;

use engine::ArchiveBuilder;
use tokio::task::JoinHandle;

/// Run one sweep now, then one every `interval`.
pub fn spawn_reaper(
    archives: Arc<ArchiveBuilder>,
    retention: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            sweep(&archives, retention).await;
        }
    })
}

/// One reaper pass. Returns how many archives were removed.
pub async fn sweep(archives: &Arc<ArchiveBuilder>, retention: Duration) -> usize {
    let archives = Arc::clone(archives);
    match tokio::task::spawn_blocking(move || archives.reap_stale(retention)).await {
        Ok(Ok(removed)) => removed,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Archive reaper sweep failed");
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "Archive reaper task panicked");
            0
        }
    }
}
