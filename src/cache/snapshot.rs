use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::EventRecord;

/// All games of one sport within a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SportGroup {
    total_found: usize,
    total_live: usize,
    games: Vec<EventRecord>,
}

impl SportGroup {
    /// `total_found` is how many live events the pricing source saw for the
    /// sport; it never drops below the number of games listed.
    pub fn new(games: Vec<EventRecord>, total_found: usize) -> Self {
        let total_live = games.iter().filter(|g| g.live_data.is_some()).count();
        Self {
            total_found: total_found.max(games.len()),
            total_live,
            games,
        }
    }

    pub fn games(&self) -> &[EventRecord] {
        &self.games
    }

    pub fn total_found(&self) -> usize {
        self.total_found
    }

    /// Games for which the stats source had a live match.
    pub fn total_live(&self) -> usize {
        self.total_live
    }
}

/// Immutable aggregate served to every reader until the next publish.
///
/// Serialized as the `/api/live-games` document. `total_games` is computed
/// here and nowhere else, so it always equals the sum of the per-sport lists.
/// `generation` is 0 until the store publishes the snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    sports: BTreeMap<String, SportGroup>,
    #[serde(rename = "total_games")]
    total_count: usize,
    #[serde(rename = "timestamp")]
    generated_at: DateTime<Utc>,
    generation: u64,
}

impl Snapshot {
    pub fn new(generated_at: DateTime<Utc>, sports: BTreeMap<String, SportGroup>) -> Self {
        let total_count = sports.values().map(|g| g.games.len()).sum();
        Self {
            sports,
            total_count,
            generated_at,
            generation: 0,
        }
    }

    pub(super) fn stamped(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Well-formed document with no games, served before the first refresh.
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self::new(generated_at, BTreeMap::new())
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Publish sequence number assigned by the store.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sports(&self) -> &BTreeMap<String, SportGroup> {
        &self.sports
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn games(&self) -> impl Iterator<Item = &EventRecord> {
        self.sports.values().flat_map(|g| g.games.iter())
    }

    pub fn find(&self, event_id: &str) -> Option<&EventRecord> {
        self.games().find(|g| g.event_id == event_id)
    }

    pub fn is_consistent(&self) -> bool {
        self.total_count == self.sports.values().map(|g| g.games.len()).sum::<usize>()
    }
}
