use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Regulation length of one soccer half in minutes.
pub const HALF_MINUTES: u32 = 45;

/// Parse an upstream timestamp: RFC 3339 (`Z` or offset), or a bare date
/// which is taken as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Gamma sometimes sends "2025-11-08 15:00:00+00".
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Current match minute derived from the start of the running period.
///
/// First half is capped at 45, second half reads 45 + (capped elapsed),
/// halftime has no minute. Any other status reports raw elapsed minutes.
pub fn game_minute(period_start_unix: i64, status: &str, now: DateTime<Utc>) -> Option<u32> {
    let elapsed_secs = now.timestamp() - period_start_unix;
    let status = status.to_lowercase();

    if status.contains("halftime") {
        return None;
    }
    if elapsed_secs < 0 {
        return None;
    }
    let elapsed = u32::try_from(elapsed_secs / 60).unwrap_or(u32::MAX);

    if status.contains("1st") || status.contains("first") {
        Some(elapsed.min(HALF_MINUTES))
    } else if status.contains("2nd") || status.contains("second") {
        Some(HALF_MINUTES + elapsed.min(HALF_MINUTES))
    } else {
        Some(elapsed)
    }
}
