//! Timestamp parsing and normalization.
//!
//! Every time-series record carries two signed 64-bit microsecond values:
//! `exchange_ts` (exchange-assigned, authoritative for ordering and dedup)
//! and `received_at` (local clock at read time, drives cursor sync).
//!
//! The wire's `ts` field is not uniform: some channels send integer Unix
//! seconds, others an ISO-8601 string with microsecond precision. Both forms
//! are accepted and normalized here.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Parse a datetime string into epoch microseconds.
///
/// Accepts RFC-3339 (any fractional precision, with offset or `Z`) and the
/// naive `YYYY-MM-DDTHH:MM:SS[.frac]` form without a timezone, which is read
/// as UTC. Empty or unparseable input yields zero.
pub fn parse_datetime_micros(s: &str) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_micros();
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return naive.and_utc().timestamp_micros();
        }
    }

    0
}

/// Normalize a raw wire `ts` value into epoch microseconds.
///
/// Integers are Unix seconds; strings go through [`parse_datetime_micros`].
/// Anything else (null, absent, objects) yields zero.
pub fn micros_from_ts_value(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().map(|secs| secs.saturating_mul(1_000_000)).unwrap_or(0),
        Value::String(s) => parse_datetime_micros(s),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_rfc3339_with_offset() {
        assert_eq!(
            parse_datetime_micros("2024-03-01T12:00:00.250000Z"),
            1_709_294_400_250_000
        );
        assert_eq!(
            parse_datetime_micros("2024-03-01T13:00:00+01:00"),
            1_709_294_400_000_000
        );
    }

    #[test]
    fn parses_naive_datetime_as_utc() {
        assert_eq!(
            parse_datetime_micros("2024-03-01T12:00:00"),
            1_709_294_400_000_000
        );
        assert_eq!(
            parse_datetime_micros("2024-03-01T12:00:00.5"),
            1_709_294_400_500_000
        );
    }

    #[test]
    fn empty_and_garbage_yield_zero() {
        assert_eq!(parse_datetime_micros(""), 0);
        assert_eq!(parse_datetime_micros("not a date"), 0);
    }

    #[test]
    fn integer_ts_is_unix_seconds() {
        assert_eq!(micros_from_ts_value(&json!(1_709_294_400)), 1_709_294_400_000_000);
    }

    #[test]
    fn string_ts_goes_through_datetime_parse() {
        assert_eq!(
            micros_from_ts_value(&json!("2024-03-01T12:00:00Z")),
            1_709_294_400_000_000
        );
    }

    #[test]
    fn null_ts_yields_zero() {
        assert_eq!(micros_from_ts_value(&Value::Null), 0);
    }
}
