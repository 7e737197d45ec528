//! Join pricing events with live stats into one [`Snapshot`].
//!
//! The pricing source decides which events exist: a stats record that
//! matches no pricing event is dropped. A pricing event with no stats match
//! keeps `live_data: None`.
//!
//! Matching first uses an explicit cross-reference (`StatsRecord::event_ref`),
//! then falls back to fuzzy team-name comparison for unreferenced records.
//! Each stats record is consumed by at most one event.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{Snapshot, SportGroup};
use crate::models::{EventRecord, PricingBatch, PricingEvent, StatsRecord};

/// Minimum share of significant words two team names must have in common.
pub const WORD_OVERLAP_THRESHOLD: f64 = 0.7;

// Longer suffixes first so " athletic club" is not left as " club".
const TEAM_SUFFIXES: [&str; 17] = [
    " saudi club",
    " saudi",
    " fc",
    " f.c.",
    " f c",
    " united",
    " city",
    " sporting",
    " athletic club",
    " club",
    " cf",
    " sc",
    " ac",
    " athletic",
    " de fútbol",
    " y esgrima",
    " esgrima",
];

const STOPWORDS: [&str; 10] = ["de", "la", "el", "cf", "sc", "ac", "as", "the", "y", "vs"];

#[derive(Debug)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    /// Records dropped for missing identity or duplication.
    pub skipped: usize,
    /// Stats records that matched no pricing event.
    pub unmatched_stats: usize,
}

/// Drop `'04`-style short years. An apostrophe not followed by a digit
/// is left for the punctuation pass.
fn strip_apostrophe_years(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Lowercase, strip punctuation, year tokens and club suffixes.
pub fn normalize_team_name(name: &str) -> String {
    let mut name = strip_apostrophe_years(&name.to_lowercase()).replace(['-', '\''], " ");
    name = name
        .split_whitespace()
        .filter(|tok| !(tok.len() == 4 && tok.chars().all(|c| c.is_ascii_digit())))
        .collect::<Vec<_>>()
        .join(" ");
    for suffix in TEAM_SUFFIXES {
        name = name.replace(suffix, "");
    }
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn teams_match(a: &str, b: &str) -> bool {
    let a = normalize_team_name(a);
    let b = normalize_team_name(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b || a.contains(&b) || b.contains(&a) {
        return true;
    }

    let words = |s: &str| -> HashSet<String> {
        s.split_whitespace()
            .filter(|w| !STOPWORDS.contains(w))
            .map(str::to_string)
            .collect()
    };
    let wa = words(&a);
    let wb = words(&b);
    if wa.is_empty() || wb.is_empty() {
        return false;
    }
    let common = wa.intersection(&wb).count();
    common as f64 / wa.len().min(wb.len()) as f64 >= WORD_OVERLAP_THRESHOLD
}

fn is_well_formed(event: &PricingEvent) -> bool {
    !event.event_id.trim().is_empty()
        && !event.sport.trim().is_empty()
        && !event.home_team.trim().is_empty()
        && !event.away_team.trim().is_empty()
}

/// Pricing events that survived validation, each with the index of the stats
/// record it was paired with.
struct Pairing<'a> {
    pairs: Vec<(&'a PricingEvent, Option<usize>)>,
    skipped: usize,
    unmatched_stats: usize,
}

fn pair<'a>(pricing: &'a [PricingEvent], stats: &[StatsRecord]) -> Pairing<'a> {
    let mut skipped = 0;

    // Stats records need either a cross-reference or both team names.
    let usable: Vec<usize> = (0..stats.len())
        .filter(|&i| {
            let ok = stats[i].event_ref.is_some() || stats[i].has_teams();
            if !ok {
                skipped += 1;
            }
            ok
        })
        .collect();

    let by_ref: HashMap<&str, usize> = usable
        .iter()
        .filter_map(|&i| stats[i].event_ref.as_deref().map(|r| (r, i)))
        .collect();
    let mut used = vec![false; stats.len()];

    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut pairs = Vec::with_capacity(pricing.len());

    for event in pricing {
        if !is_well_formed(event) {
            debug!(target: "merge", title = %event.title, "skipping malformed pricing record");
            skipped += 1;
            continue;
        }
        if !seen_ids.insert(event.event_id.as_str()) {
            debug!(target: "merge", event_id = %event.event_id, "skipping duplicate pricing record");
            skipped += 1;
            continue;
        }

        let matched = match by_ref.get(event.event_id.as_str()) {
            Some(&i) if !used[i] => Some(i),
            _ => usable.iter().copied().find(|&i| {
                let s = &stats[i];
                !used[i]
                    && s.event_ref.is_none()
                    && teams_match(&event.home_team, &s.home_team)
                    && teams_match(&event.away_team, &s.away_team)
            }),
        };
        if let Some(i) = matched {
            used[i] = true;
        }
        pairs.push((event, matched));
    }

    let unmatched_stats = usable.iter().filter(|&&i| !used[i]).count();
    Pairing {
        pairs,
        skipped,
        unmatched_stats,
    }
}

/// Indices of the stats records that [`merge`] would attach to an event.
pub fn matched_stats(pricing: &[PricingEvent], stats: &[StatsRecord]) -> Vec<usize> {
    pair(pricing, stats)
        .pairs
        .into_iter()
        .filter_map(|(_, matched)| matched)
        .collect()
}

pub fn merge(pricing: &PricingBatch, stats: &[StatsRecord], generated_at: DateTime<Utc>) -> MergeOutcome {
    let Pairing {
        pairs,
        skipped,
        unmatched_stats,
    } = pair(&pricing.events, stats);

    let mut grouped: BTreeMap<String, Vec<EventRecord>> = pricing
        .found
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(sport, _)| (sport.clone(), Vec::new()))
        .collect();
    for (event, matched) in pairs {
        let live = matched.map(|i| &stats[i].live);
        grouped
            .entry(event.sport.clone())
            .or_default()
            .push(EventRecord::from_parts(event, live));
    }

    let sports = grouped
        .into_iter()
        .map(|(sport, games)| {
            let found = pricing.found_for(&sport);
            (sport, SportGroup::new(games, found))
        })
        .collect();

    MergeOutcome {
        snapshot: Snapshot::new(generated_at, sports),
        skipped,
        unmatched_stats,
    }
}
