use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;

/// Values at or above this are treated as epoch milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Storage format for every timestamp written by this crate. Fixed width,
/// so text ordering matches time ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses RFC 3339, SQLite `datetime('now')` text and numeric epoch values
/// (seconds or milliseconds).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ndt.and_utc());
        }
    }

    if let Ok(n) = raw.parse::<i64>() {
        return if n.abs() >= MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        };
    }

    if let Ok(secs) = raw.parse::<f64>() {
        if secs.is_finite() {
            return DateTime::from_timestamp_millis((secs * 1000.0) as i64);
        }
    }

    None
}

/// Lenient read path: unparseable values become the current time.
/// The bad value is only logged, never reported to the caller.
pub fn normalize_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Unparseable timestamp '{}' on {}, substituting now", raw, context);
        Utc::now()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn parses_rfc3339_and_sqlite_text() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(expected));
    }

    #[test]
    fn parses_epoch_seconds_and_millis() {
        let secs = parse_timestamp("1700000000").unwrap();
        let millis = parse_timestamp("1700000000000").unwrap();
        assert_eq!(secs, millis);
        assert_eq!(secs.year(), 2023);
        assert_eq!(parse_timestamp("1700000000.5").unwrap().nanosecond(), 500_000_000);
    }

    #[test]
    fn garbage_is_masked_with_now() {
        assert_eq!(parse_timestamp("next tuesday"), None);
        let before = Utc::now();
        let ts = normalize_timestamp("next tuesday", "test row");
        assert!(ts >= before);
    }

    #[test]
    fn stored_format_round_trips_and_sorts() {
        let a = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(a)), Some(a));
        assert!(format_timestamp(a) < format_timestamp(b));
    }
}
