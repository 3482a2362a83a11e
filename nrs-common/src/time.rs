//! Timestamp utilities
//!
//! Fragments carry ISO-8601 `lastUpdated` strings and custom entry IDs embed a
//! compact `YYYYMMDDTHHMMSS` UTC timestamp. Both formats are handled here.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Compact timestamp layout used inside custom entry identifiers
pub const COMPACT_FORMAT: &str = "%Y%m%dT%H%M%S";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a timestamp the way fragments store it (`2025-01-31T12:00:00.000Z`)
pub fn to_iso_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored `lastUpdated` value
///
/// Accepts RFC 3339 with any offset, plus offset-less date-times which are
/// taken as UTC. Anything else is `None`; callers treat that as "no valid
/// timestamp" rather than an error.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Format a timestamp as `YYYYMMDDTHHMMSS` (UTC)
pub fn to_compact(at: DateTime<Utc>) -> String {
    at.format(COMPACT_FORMAT).to_string()
}

/// Parse a `YYYYMMDDTHHMMSS` timestamp; rejects impossible dates
pub fn parse_compact(raw: &str) -> Option<NaiveDateTime> {
    if raw.len() != 15 {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, COMPACT_FORMAT).ok()
}

/// Convert whole days to milliseconds
pub fn days_to_millis(days: f64) -> f64 {
    days * 24.0 * 60.0 * 60.0 * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_iso_string_matches_fragment_layout() {
        let at = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 5).unwrap();
        assert_eq!(to_iso_string(at), "2025-01-31T12:00:05.000Z");
    }

    #[test]
    fn test_parse_timestamp_rfc3339_with_offset() {
        let parsed = parse_timestamp("2025-01-31T14:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        let parsed = parse_timestamp("2025-01-31T12:00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2025-13-45T99:00:00Z").is_none());
    }

    #[test]
    fn test_iso_round_trip() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp(&to_iso_string(at)), Some(at));
    }

    #[test]
    fn test_compact_format() {
        let at = Utc.with_ymd_and_hms(2007, 4, 5, 14, 30, 50).unwrap();
        assert_eq!(to_compact(at), "20070405T143050");
        assert_eq!(parse_compact("20070405T143050"), Some(at.naive_utc()));
    }

    #[test]
    fn test_parse_compact_rejects_impossible_dates() {
        assert!(parse_compact("20071305T143050").is_none());
        assert!(parse_compact("20070405T256050").is_none());
        assert!(parse_compact("2007040T143050").is_none());
    }

    #[test]
    fn test_days_to_millis() {
        assert_eq!(days_to_millis(30.0), 2_592_000_000.0);
    }
}
