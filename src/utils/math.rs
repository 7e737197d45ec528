use crate::models::{GraphPoint, Momentum, MomentumDirection};

/// Number of trailing graph points that feed the momentum value.
pub const MOMENTUM_WINDOW: usize = 5;

/// Graph value beyond which one side is considered to have momentum.
pub const MOMENTUM_THRESHOLD: i64 = 15;

/// Linearly weighted mean of the last [`MOMENTUM_WINDOW`] graph points; the
/// most recent point weighs the most. `None` for an empty graph.
pub fn weighted_momentum(points: &[GraphPoint]) -> Option<i64> {
    let start = points.len().saturating_sub(MOMENTUM_WINDOW);
    let recent = &points[start..];
    if recent.is_empty() {
        return None;
    }

    let (weighted_sum, total_weight) = recent
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, total), (i, p)| {
            let weight = (i + 1) as f64;
            (sum + p.value * weight, total + weight)
        });

    Some((weighted_sum / total_weight).trunc() as i64)
}

pub fn direction_from_value(value: i64) -> MomentumDirection {
    if value > MOMENTUM_THRESHOLD {
        MomentumDirection::Home
    } else if value < -MOMENTUM_THRESHOLD {
        MomentumDirection::Away
    } else {
        MomentumDirection::Neutral
    }
}

/// Fallback direction when there is no pressure graph: possession margin of
/// more than 10 points scores 1, more attacks 1.5, more dangerous attacks 2.
/// A side needs more than 1.2x the other's score.
pub fn direction_from_stats(m: &Momentum) -> MomentumDirection {
    let mut home = 0.0_f64;
    let mut away = 0.0_f64;
    let mut factors = 0;

    if let (Some(h), Some(a)) = (m.possession_home, m.possession_away) {
        if h > a + 10 {
            home += 1.0;
        } else if a > h + 10 {
            away += 1.0;
        }
        factors += 1;
    }

    if let (Some(h), Some(a)) = (m.attacks_home, m.attacks_away) {
        if h > a {
            home += 1.5;
        } else if a > h {
            away += 1.5;
        }
        factors += 1;
    }

    if let (Some(h), Some(a)) = (m.dangerous_attacks_home, m.dangerous_attacks_away) {
        if h > a {
            home += 2.0;
        } else if a > h {
            away += 2.0;
        }
        factors += 1;
    }

    if factors == 0 {
        return MomentumDirection::Neutral;
    }

    if home > away * 1.2 {
        MomentumDirection::Home
    } else if away > home * 1.2 {
        MomentumDirection::Away
    } else {
        MomentumDirection::Neutral
    }
}
