//! Single-writer, many-reader cell holding the live [`Snapshot`].
//!
//! The refresh scheduler is the only writer. Request handlers only ever call
//! [`CacheStore::read`], which clones an `Arc` under a read lock and never
//! touches the network. No lock in this module is held across an `.await`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::SourceKind;

pub mod snapshot;

pub use snapshot::{Snapshot, SportGroup};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPhase {
    #[default]
    Idle,
    Fetching,
    Publishing,
    Failed,
}

/// Operational metadata kept next to the snapshot, never inside it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RefreshState {
    pub phase: RefreshPhase,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Set when the most recent cycle published nothing.
    pub last_error: Option<String>,
    /// Per-source failures of the most recent cycle.
    pub source_errors: BTreeMap<String, String>,
    /// When the batch each source contributed was fetched. A source whose
    /// data was too old to reuse has no entry.
    pub source_fetched_at: BTreeMap<String, DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub skipped_records: usize,
    /// Generation of the live snapshot; 0 before the first publish.
    pub generation: u64,
}

/// What a refresh cycle observed, recorded alongside publish/failure.
#[derive(Clone, Debug, Default)]
pub struct CycleReport {
    pub source_errors: Vec<(SourceKind, String)>,
    pub fetched_at: Vec<(SourceKind, DateTime<Utc>)>,
    pub skipped_records: usize,
}

impl CycleReport {
    pub fn is_partial(&self) -> bool {
        !self.source_errors.is_empty()
    }
}

/// Result of a read: the live snapshot, or the initial "never populated" state.
#[derive(Clone, Debug)]
pub enum CacheView {
    Empty,
    Populated(Arc<Snapshot>),
}

impl CacheView {
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            CacheView::Empty => None,
            CacheView::Populated(s) => Some(s),
        }
    }

    /// The snapshot to serve; an empty document stamped `now` if nothing was
    /// ever published.
    pub fn into_snapshot(self, now: DateTime<Utc>) -> Arc<Snapshot> {
        match self {
            CacheView::Empty => Arc::new(Snapshot::empty(now)),
            CacheView::Populated(s) => s,
        }
    }
}

#[derive(Default)]
struct Inner {
    snapshot: Option<Arc<Snapshot>>,
    state: RefreshState,
}

#[derive(Default)]
pub struct CacheStore {
    inner: RwLock<Inner>,
    reads: AtomicU64,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> CacheView {
        self.reads.fetch_add(1, Ordering::Relaxed);
        match &self.inner.read().snapshot {
            Some(s) => CacheView::Populated(Arc::clone(s)),
            None => CacheView::Empty,
        }
    }

    /// Number of [`read`](Self::read) calls served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.read().state.clone()
    }

    /// Swap in a new snapshot and return the generation it was stamped with.
    ///
    /// Generations come from a counter behind the write lock, so every
    /// publish is strictly newer than the last one whatever the wall clock
    /// says about `generated_at`.
    pub fn publish(&self, snapshot: Snapshot, report: &CycleReport) -> u64 {
        let now = Utc::now();
        let mut inner = self.inner.write();

        if let Some(current) = &inner.snapshot {
            if snapshot.generated_at() < current.generated_at() {
                warn!(
                    target: "refresh",
                    current = %current.generated_at(),
                    incoming = %snapshot.generated_at(),
                    "wall clock moved backwards between publishes"
                );
            }
        }

        let generation = inner.state.generation + 1;
        let total = snapshot.total_count();
        inner.snapshot = Some(Arc::new(snapshot.stamped(generation)));
        inner.state.generation = generation;
        inner.state.last_success_at = Some(now);
        inner.state.last_attempt_at = Some(now);
        inner.state.last_error = None;
        inner.state.consecutive_failures = 0;
        Self::apply_report(&mut inner.state, report);
        drop(inner);

        debug!(target: "refresh", total_games = total, generation, "snapshot published");
        generation
    }

    /// Record a cycle that published nothing. The live snapshot is untouched.
    pub fn record_failure(&self, error: impl Into<String>, report: &CycleReport) {
        let mut inner = self.inner.write();
        inner.state.last_attempt_at = Some(Utc::now());
        inner.state.last_error = Some(error.into());
        inner.state.consecutive_failures = inner.state.consecutive_failures.saturating_add(1);
        Self::apply_report(&mut inner.state, report);
    }

    pub fn set_phase(&self, phase: RefreshPhase) {
        self.inner.write().state.phase = phase;
    }

    fn apply_report(state: &mut RefreshState, report: &CycleReport) {
        state.source_errors = report
            .source_errors
            .iter()
            .map(|(kind, err)| (kind.to_string(), err.clone()))
            .collect();
        state.source_fetched_at = report
            .fetched_at
            .iter()
            .map(|(kind, at)| (kind.to_string(), *at))
            .collect();
        state.skipped_records = report.skipped_records;
    }
}
