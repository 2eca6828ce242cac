//! Date parsing for the upstream CSV exports.
//!
//! `AirNow` rows carry an hourly `UTC` timestamp (`2023-07-15T10:00`),
//! FIRMS rows a plain `acq_date` (`2023-07-15`). Everything is reduced to
//! day granularity.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parses a date or timestamp string into a calendar date.
///
/// Returns `None` for empty or unrecognized input.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc().date());
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_plain_dates() {
        assert_eq!(parse_date("2023-07-15"), Some(ymd(2023, 7, 15)));
        assert_eq!(parse_date(" 07/15/2023 "), Some(ymd(2023, 7, 15)));
    }

    #[test]
    fn parses_airnow_hourly_timestamps() {
        assert_eq!(parse_date("2023-07-15T10:00"), Some(ymd(2023, 7, 15)));
        assert_eq!(parse_date("2023-07-15 23:00:00"), Some(ymd(2023, 7, 15)));
    }

    #[test]
    fn parses_rfc3339_in_utc() {
        assert_eq!(
            parse_date("2023-07-15T23:30:00-02:00"),
            Some(ymd(2023, 7, 16))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("2023-13-01"), None);
    }
}
