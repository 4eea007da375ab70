//! Time utility functions

use chrono::{DateTime, Utc};

/// Convert microseconds since Unix epoch to DateTime<Utc>
pub fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(|| {
        tracing::warn!(micros, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Parse ISO 8601 / RFC 3339 timestamp string to DateTime<Utc>
pub fn parse_iso_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn micros_conversion_round_values() {
        assert_eq!(micros_to_datetime(0), DateTime::UNIX_EPOCH);

        // 2024-01-01 00:00:00 UTC
        let dt = micros_to_datetime(1_704_067_200_000_000);
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 1));
    }

    #[test]
    fn out_of_range_micros_fall_back_to_epoch() {
        assert_eq!(micros_to_datetime(i64::MAX), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn iso_timestamps_parse_to_utc() {
        let dt = parse_iso_timestamp("2024-01-15T10:30:00Z").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (10, 30));

        // 10:30 at +05:00 is 05:30 UTC
        let shifted = parse_iso_timestamp("2024-01-15T10:30:00+05:00").unwrap();
        assert_eq!((shifted.hour(), shifted.minute()), (5, 30));
    }

    #[test]
    fn garbage_timestamp_is_none() {
        assert!(parse_iso_timestamp("not-a-timestamp").is_none());
        assert!(parse_iso_timestamp("2024-13-99").is_none());
    }
}
