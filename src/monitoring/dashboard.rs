use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::monitoring::metrics::{log_metrics_snapshot, METRICS};

/// Spawn a background task that periodically logs a compact metrics snapshot
/// until `shutdown` is cancelled.
pub fn spawn_metrics_logger(period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::spawn(async move {
        // The first tick completes immediately; skip it so the first line
        // carries a full period of activity.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(target: "metrics", "metrics logger stopped");
                    break;
                }
                _ = ticker.tick() => {
                    log_metrics_snapshot(&METRICS.snapshot());
                }
            }
        }
    })
}
