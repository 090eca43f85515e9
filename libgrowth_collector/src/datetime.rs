//! Datetime parsing and arithmetic helpers.
//!
//! The three lab subsystems have no shared clock: Molly times are relative to
//! midnight of the bucket's day, BET times to a file creation instant, SVT
//! times to midnight of a day that has to be inferred. Everything in this
//! crate therefore works with naive local datetimes and converts to
//! seconds-since-epoch as late as possible.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use super::constants::EPOCH_FORMAT;
use super::error::TimeInputError;

/// Parse a flexible human-readable datetime string.
///
/// Accepted forms, tried in order:
/// - `YYYY-mm-dd HH:MM:SS[.ffffff]`
/// - `YYYY-mm-dd HH:MM`
/// - `YYYY-mm-dd` (interpreted as midnight)
pub fn parse_datetime_str(input: &str) -> Result<NaiveDateTime, TimeInputError> {
    let trimmed = input.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(midnight_of_date(date));
    }

    Err(TimeInputError::BadDatetimeString(input.to_string()))
}

/// Signed seconds from `earlier` to `later`, with microsecond resolution.
pub fn seconds_between(later: NaiveDateTime, earlier: NaiveDateTime) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 * 1e-6,
        // Only reachable for spans of several hundred thousand years.
        None => delta.num_seconds() as f64,
    }
}

/// Truncate to the start of the hour.
pub fn floor_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Truncate to midnight of the same day.
pub fn midnight_of(dt: NaiveDateTime) -> NaiveDateTime {
    midnight_of_date(dt.date())
}

/// Midnight at the start of `date`.
pub fn midnight_of_date(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_else(|| date.into())
}

/// Shift a datetime by a (possibly fractional) number of seconds.
pub fn offset_by_seconds(dt: NaiveDateTime, seconds: f64) -> NaiveDateTime {
    dt + Duration::microseconds((seconds * 1e6).round() as i64)
}

/// Format an epoch instant for file headers (microsecond precision).
pub fn format_epoch(dt: NaiveDateTime) -> String {
    dt.format(EPOCH_FORMAT).to_string()
}

/// Parse an epoch instant written by [`format_epoch`].
pub fn parse_epoch(text: &str) -> Result<NaiveDateTime, TimeInputError> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|_| TimeInputError::BadDatetimeString(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_datetime() {
        let dt = parse_datetime_str("2019-08-16 21:30:05.250000").unwrap();
        assert_eq!(format_epoch(dt), "2019-08-16 21:30:05.250000");
    }

    #[test]
    fn test_parse_date_only_is_midnight() {
        let dt = parse_datetime_str("2019-08-16").unwrap();
        assert_eq!(format_epoch(dt), "2019-08-16 00:00:00.000000");
    }

    #[test]
    fn test_parse_minutes_only() {
        let dt = parse_datetime_str("2019-08-16 01:30").unwrap();
        assert_eq!(dt.hour(), 1);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_datetime_str("yesterday-ish").is_err());
    }

    #[test]
    fn test_floor_and_seconds() {
        let dt = parse_datetime_str("2019-08-16 01:30:59.123").unwrap();
        let floored = floor_hour(dt);
        assert_eq!(format_epoch(floored), "2019-08-16 01:00:00.000000");
        assert!((seconds_between(dt, floored) - 1859.123).abs() < 1e-6);
    }

    #[test]
    fn test_epoch_round_trip() {
        let dt = parse_datetime_str("2021-02-03 04:05:06.000789").unwrap();
        assert_eq!(parse_epoch(&format_epoch(dt)).unwrap(), dt);
    }
}
