//! Multi-format timestamp parsing shared by the JSON and regex parsers
//! (spec §4.1's timestamp format list).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%b/%Y:%H:%M:%S %z",
];

/// Tries, in order: RFC3339 (with/without fractional seconds), a handful of
/// common naive formats, Unix seconds (10-digit integer), Unix
/// milliseconds (13-digit integer).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if raw.contains('%') {
        // never matches a real timestamp; guards against format-string injection below
        return None;
    }

    // `%d/%b/%Y:%H:%M:%S %z` parses with offset directly.
    if let Ok(dt) = DateTime::parse_from_str(raw, "%d/%b/%Y:%H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in &NAIVE_FORMATS[..3] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if is_all_digits(raw) {
        if raw.len() == 13 {
            if let Ok(ms) = raw.parse::<i64>() {
                return Utc.timestamp_millis_opt(ms).single();
            }
        } else if raw.len() == 10 {
            if let Ok(secs) = raw.parse::<i64>() {
                return Utc.timestamp_opt(secs, 0).single();
            }
        }
    }

    None
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339() {
        let dt = parse_timestamp("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn parses_unix_seconds_vs_millis() {
        let secs = parse_timestamp("1705312800").unwrap();
        let millis = parse_timestamp("1705312800123").unwrap();
        assert_eq!(secs.timestamp(), 1705312800);
        assert_eq!(millis.timestamp_millis(), 1705312800123);
    }

    #[test]
    fn parses_apache_style() {
        let dt = parse_timestamp("15/Jan/2024:10:30:00 +0000").unwrap();
        assert_eq!(dt.timestamp(), 1705314600);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("not-a-date").is_none());
    }
}
