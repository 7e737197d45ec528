//! Sport catalogue: which Polymarket events belong to which sport, and how to
//! read team names out of an event title.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::gamma::GammaEvent;
use crate::utils::time::parse_timestamp;

const TITLE_SEPARATORS: [&str; 3] = [" vs. ", " vs ", " v "];
const TITLE_SUFFIXES: [&str; 3] = [" - More Markets", " - Match Winner", " - Moneyline"];

const NON_SOCCER_MARKET_TERMS: [&str; 9] = [
    "dota",
    "counter-strike",
    "valorant",
    "league of legends",
    "lol:",
    "ufc",
    "margin of victory",
    "larger margin",
    "more markets",
];

const SOCCER_TITLE_TERMS: [&str; 26] = [
    "united",
    "city fc",
    "athletic",
    "sporting",
    "real ",
    "club ",
    "wanderers",
    "glory",
    "mariners",
    "victory",
    "rovers",
    "esgrima",
    "sarsfield",
    "gimnasia",
    "vélez",
    "velez",
    "river plate",
    "boca juniors",
    "flamengo",
    "palmeiras",
    "santos",
    "corinthians",
    "fluminense",
    "atletico",
    "atlético",
    "independiente",
];

// College and other leagues whose nicknames collide with soccer keywords.
const NON_SOCCER_TITLE_TERMS: [&str; 16] = [
    "gamecocks",
    "raiders",
    "wildcats",
    "tigers",
    "ospreys",
    "cardinals",
    "warriors",
    "lancers",
    "trailblazers",
    "jaguars",
    "leathernecks",
    "sharks",
    "tulane",
    "tulsa",
    "margin of victory",
    "larger margin",
];

const NHL_TITLE_TERMS: [&str; 32] = [
    "bruins",
    "maple leafs",
    "canadiens",
    "senators",
    "sabres",
    "rangers",
    "islanders",
    "devils",
    "flyers",
    "penguins",
    "capitals",
    "hurricanes",
    "blue jackets",
    "panthers",
    "lightning",
    "blackhawks",
    "avalanche",
    "stars",
    "wild",
    "predators",
    "blues",
    "jets",
    "flames",
    "oilers",
    "canucks",
    "golden knights",
    "kings",
    "ducks",
    "sharks",
    "coyotes",
    "kraken",
    "nhl",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Soccer,
    Nhl,
}

impl Sport {
    /// Display name, also the key of the sport in a snapshot.
    pub fn name(&self) -> &'static str {
        match self {
            Sport::Soccer => "Soccer",
            Sport::Nhl => "NHL",
        }
    }

    pub fn has_draw_option(&self) -> bool {
        matches!(self, Sport::Soccer)
    }

    pub fn is_sport_event(&self, event: &GammaEvent) -> bool {
        match self {
            Sport::Soccer => is_soccer_event(event),
            Sport::Nhl => is_nhl_event(&event.title),
        }
    }

    /// First of `sports` that claims `event`.
    pub fn classify(sports: &[Sport], event: &GammaEvent) -> Option<Sport> {
        sports.iter().copied().find(|s| s.is_sport_event(event))
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn is_soccer_event(event: &GammaEvent) -> bool {
    let title = event.title.to_lowercase();

    // A single market with home/draw/away outcomes is the strongest signal.
    let has_three_way_market = event.markets.iter().any(|m| {
        let outcomes = m.outcomes();
        outcomes.len() == 3
            && outcomes.iter().any(|o| {
                let o = o.to_lowercase();
                o.contains("draw") || o.contains("tie")
            })
    });
    if has_three_way_market && !contains_any(&title, &NON_SOCCER_MARKET_TERMS) {
        return true;
    }

    let has_fc = title.contains("fc") || title.contains("f.c.");
    let is_soccer = has_fc || contains_any(&title, &SOCCER_TITLE_TERMS);
    let excluded = contains_any(&title, &NON_SOCCER_MARKET_TERMS)
        || contains_any(&title, &NON_SOCCER_TITLE_TERMS);

    is_soccer && !excluded
}

fn is_nhl_event(title: &str) -> bool {
    let title = title.to_lowercase();
    let looks_like_soccer = title.contains("fc") || contains_any(&title, &["united", "city fc"]);
    contains_any(&title, &NHL_TITLE_TERMS) && !looks_like_soccer
}

/// Split "Home vs. Away - Match Winner" into `("Home", "Away")`.
pub fn extract_teams(title: &str) -> Option<(String, String)> {
    let mut clean = title.to_string();
    for suffix in TITLE_SUFFIXES {
        clean = clean.replace(suffix, "");
    }

    // ASCII lowering keeps byte offsets aligned with `clean`.
    let lower = clean.to_ascii_lowercase();
    for sep in TITLE_SEPARATORS {
        if let Some(idx) = lower.find(sep) {
            let home = clean[..idx].trim();
            let away = clean[idx + sep.len()..].trim();
            if home.is_empty() || away.is_empty() {
                return None;
            }
            return Some((home.to_string(), away.to_string()));
        }
    }
    None
}

/// Open and already started. The stats feed is the real arbiter of "live".
pub fn is_live_event(event: &GammaEvent, now: DateTime<Utc>) -> bool {
    if event.closed.unwrap_or(false) {
        return false;
    }
    event
        .start_time
        .as_deref()
        .or(event.event_date.as_deref())
        .and_then(parse_timestamp)
        .map(|start| start <= now)
        .unwrap_or(false)
}
