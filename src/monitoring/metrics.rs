use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::info;

/// Global metrics registry used across the proxy.
pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::default);

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[derive(Default)]
struct MetricsInner {
    refreshes_succeeded: AtomicU64,
    refreshes_failed: AtomicU64,
    refreshes_partial: AtomicU64,
    records_skipped: AtomicU64,
    snapshots_served: AtomicU64,
    auth_rejections: AtomicU64,
    last_refresh_ts: AtomicU64,
}

/// Lightweight metrics handle backed by atomics so it can be cloned cheaply.
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl Metrics {
    pub fn record_refresh_success(&self, total_games: usize, skipped: usize, partial: bool) {
        self.inner.refreshes_succeeded.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
        if partial {
            self.inner.refreshes_partial.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .last_refresh_ts
            .store(now_unix_secs(), Ordering::Relaxed);

        info!(
            target: "metrics",
            event = "refresh_succeeded",
            total_games,
            skipped,
            partial,
            total_refreshes = self.inner.refreshes_succeeded.load(Ordering::Relaxed),
            "refresh published"
        );
    }

    pub fn record_refresh_failure(&self, reason: &str) {
        self.inner.refreshes_failed.fetch_add(1, Ordering::Relaxed);

        info!(
            target: "metrics",
            event = "refresh_failed",
            reason = %reason,
            total_failures = self.inner.refreshes_failed.load(Ordering::Relaxed),
            "refresh failed"
        );
    }

    pub fn record_snapshot_served(&self) {
        self.inner.snapshots_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auth_rejection(&self, reason: &str) {
        self.inner.auth_rejections.fetch_add(1, Ordering::Relaxed);

        info!(
            target: "metrics",
            event = "auth_rejected",
            reason = %reason,
            total_rejections = self.inner.auth_rejections.load(Ordering::Relaxed),
            "request rejected"
        );
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            refreshes_succeeded: self.inner.refreshes_succeeded.load(Ordering::Relaxed),
            refreshes_failed: self.inner.refreshes_failed.load(Ordering::Relaxed),
            refreshes_partial: self.inner.refreshes_partial.load(Ordering::Relaxed),
            records_skipped: self.inner.records_skipped.load(Ordering::Relaxed),
            snapshots_served: self.inner.snapshots_served.load(Ordering::Relaxed),
            auth_rejections: self.inner.auth_rejections.load(Ordering::Relaxed),
            last_refresh_ts: self.inner.last_refresh_ts.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of current metrics used by the periodic logger.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub refreshes_succeeded: u64,
    pub refreshes_failed: u64,
    pub refreshes_partial: u64,
    pub records_skipped: u64,
    pub snapshots_served: u64,
    pub auth_rejections: u64,
    pub last_refresh_ts: u64,
}

pub fn log_metrics_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        target: "metrics",
        event = "metrics_snapshot",
        refreshes_succeeded = snapshot.refreshes_succeeded,
        refreshes_failed = snapshot.refreshes_failed,
        refreshes_partial = snapshot.refreshes_partial,
        records_skipped = snapshot.records_skipped,
        snapshots_served = snapshot.snapshots_served,
        auth_rejections = snapshot.auth_rejections,
        last_refresh_ts = snapshot.last_refresh_ts,
        "metrics snapshot"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_on_a_private_registry() {
        let m = Metrics::default();
        m.record_refresh_success(10, 2, false);
        m.record_refresh_success(8, 1, true);
        m.record_refresh_failure("both sources failed");
        m.record_snapshot_served();
        m.record_auth_rejection("Token expired");

        let s = m.snapshot();
        assert_eq!(s.refreshes_succeeded, 2);
        assert_eq!(s.refreshes_partial, 1);
        assert_eq!(s.refreshes_failed, 1);
        assert_eq!(s.records_skipped, 3);
        assert_eq!(s.snapshots_served, 1);
        assert_eq!(s.auth_rejections, 1);
        assert!(s.last_refresh_ts > 0);
    }
}
