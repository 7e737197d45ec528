//! Background refresh loop: fetch both upstreams, merge, publish.
//!
//! The scheduler owns the only path that performs upstream I/O. Cycles run
//! strictly one after another inside a single task; between cycles it sleeps
//! for a delay drawn uniformly from the configured window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, CycleReport, RefreshPhase};
use crate::client::{PricingSource, SourceKind, StatsSource};
use crate::merge::{matched_stats, merge};
use crate::models::{PricingBatch, StatsRecord};
use crate::monitoring::metrics::METRICS;
use crate::types::RefreshConfig;

/// Closed delay window `[min, max]`, sampled at millisecond granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitterInterval {
    min: Duration,
    max: Duration,
}

impl JitterInterval {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_config(cfg: &RefreshConfig) -> Self {
        Self::new(cfg.min_interval(), cfg.max_interval())
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rng.random_range(lo..=hi))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { total_games: usize, partial: bool },
    Failed(String),
}

/// Last good batch of one source and when it was fetched.
struct Retained<T> {
    batch: T,
    fetched_at: DateTime<Utc>,
}

impl<T> Retained<T> {
    fn new(batch: T, fetched_at: DateTime<Utc>) -> Self {
        Self { batch, fetched_at }
    }

    /// A clock that moved backwards never expires a batch.
    fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        (now - self.fetched_at)
            .to_std()
            .map(|age| age >= max_age)
            .unwrap_or(false)
    }
}

/// Drop `slot` if it is too old to stand in for a failed fetch.
fn expire<T>(slot: &mut Option<Retained<T>>, kind: SourceKind, now: DateTime<Utc>, max_age: Duration) {
    let Some(fetched_at) = slot
        .as_ref()
        .filter(|r| r.is_expired(now, max_age))
        .map(|r| r.fetched_at)
    else {
        return;
    };
    warn!(
        target: "refresh",
        source = %kind,
        %fetched_at,
        "previous batch too old to reuse; dropping it"
    );
    *slot = None;
}

pub struct RefreshScheduler {
    store: Arc<CacheStore>,
    pricing: Arc<dyn PricingSource>,
    stats: Arc<dyn StatsSource>,
    interval: JitterInterval,
    max_retained_age: Duration,
    last_pricing: Option<Retained<PricingBatch>>,
    last_stats: Option<Retained<Vec<StatsRecord>>>,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<CacheStore>,
        pricing: Arc<dyn PricingSource>,
        stats: Arc<dyn StatsSource>,
        interval: JitterInterval,
    ) -> Self {
        Self {
            store,
            pricing,
            stats,
            interval,
            max_retained_age: RefreshConfig::default().max_retained_age(),
            last_pricing: None,
            last_stats: None,
        }
    }

    pub fn from_config(
        store: Arc<CacheStore>,
        pricing: Arc<dyn PricingSource>,
        stats: Arc<dyn StatsSource>,
        cfg: &RefreshConfig,
    ) -> Self {
        Self::new(store, pricing, stats, JitterInterval::from_config(cfg))
            .with_max_retained_age(cfg.max_retained_age())
    }

    /// How long a failed source may be covered by its previous batch.
    pub fn with_max_retained_age(mut self, max_age: Duration) -> Self {
        self.max_retained_age = max_age;
        self
    }

    /// Run one fetch/merge/publish cycle.
    ///
    /// A failed source is replaced by the last batch it delivered, if that
    /// batch is younger than the retention limit, and its error is recorded
    /// on the store. Nothing is published when both sources fail or when no
    /// usable pricing batch is held.
    pub async fn refresh_once(&mut self) -> CycleOutcome {
        self.store.set_phase(RefreshPhase::Fetching);
        debug!(target: "refresh", phase = "fetching", "refresh cycle started");

        let (pricing, stats) = tokio::join!(self.pricing.fetch_events(), self.stats.fetch_live());
        let now = Utc::now();

        let mut report = CycleReport::default();
        match pricing {
            Ok(batch) => {
                debug!(target: "refresh", events = batch.events.len(), "pricing batch received");
                self.last_pricing = Some(Retained::new(batch, now));
            }
            Err(err) => {
                warn!(target: "refresh", source = "pricing", error = %err, "upstream fetch failed");
                report.source_errors.push((SourceKind::Pricing, err.to_string()));
                expire(&mut self.last_pricing, SourceKind::Pricing, now, self.max_retained_age);
            }
        }
        match stats {
            Ok(mut batch) => {
                debug!(target: "refresh", records = batch.len(), "stats batch received");
                self.attach_details(&mut batch).await;
                self.last_stats = Some(Retained::new(batch, now));
            }
            Err(err) => {
                warn!(target: "refresh", source = "stats", error = %err, "upstream fetch failed");
                report.source_errors.push((SourceKind::Stats, err.to_string()));
                expire(&mut self.last_stats, SourceKind::Stats, now, self.max_retained_age);
            }
        }

        if let Some(r) = &self.last_pricing {
            report.fetched_at.push((SourceKind::Pricing, r.fetched_at));
        }
        if let Some(r) = &self.last_stats {
            report.fetched_at.push((SourceKind::Stats, r.fetched_at));
        }

        if report.source_errors.len() == 2 {
            return self.fail("all upstream sources failed", &report);
        }
        let Some(pricing) = self.last_pricing.as_ref().map(|r| &r.batch) else {
            return self.fail("no pricing data available", &report);
        };
        let stats = self.last_stats.as_ref().map(|r| r.batch.as_slice()).unwrap_or(&[]);

        self.store.set_phase(RefreshPhase::Publishing);
        let merged = merge(pricing, stats, Utc::now());
        report.skipped_records = merged.skipped;
        let total_games = merged.snapshot.total_count();
        let partial = report.is_partial();

        if merged.unmatched_stats > 0 {
            debug!(
                target: "refresh",
                unmatched = merged.unmatched_stats,
                "stats records without a pricing event dropped"
            );
        }

        let generation = self.store.publish(merged.snapshot, &report);
        self.store.set_phase(RefreshPhase::Idle);

        METRICS.record_refresh_success(total_games, report.skipped_records, partial);
        info!(
            target: "refresh",
            total_games,
            skipped = report.skipped_records,
            partial,
            generation,
            "refresh cycle complete"
        );
        CycleOutcome::Published { total_games, partial }
    }

    /// Ask the stats source for per-match details, but only for records the
    /// held pricing batch will actually list.
    async fn attach_details(&self, records: &mut [StatsRecord]) {
        let Some(pricing) = &self.last_pricing else {
            return;
        };
        let matched = matched_stats(&pricing.batch.events, records);
        if !matched.is_empty() {
            self.stats.attach_details(records, &matched).await;
        }
    }

    fn fail(&self, reason: &str, report: &CycleReport) -> CycleOutcome {
        self.store.record_failure(reason, report);
        self.store.set_phase(RefreshPhase::Failed);
        METRICS.record_refresh_failure(reason);
        warn!(target: "refresh", reason, "refresh cycle failed; keeping previous snapshot");
        CycleOutcome::Failed(reason.to_string())
    }

    /// Refresh immediately, then keep refreshing after jittered delays until
    /// `shutdown` fires. An in-flight cycle is abandoned on shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut rng = StdRng::from_os_rng();
        info!(
            target: "refresh",
            min_secs = self.interval.min().as_secs_f64(),
            max_secs = self.interval.max().as_secs_f64(),
            "refresh scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.refresh_once() => {
                    debug!(target: "refresh", ?outcome, "cycle finished");
                }
            }

            let delay = self.interval.sample(&mut rng);
            debug!(target: "refresh", delay_ms = delay.as_millis() as u64, "next refresh scheduled");

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.store.set_phase(RefreshPhase::Idle);
        info!(target: "refresh", "refresh scheduler stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
