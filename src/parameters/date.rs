//! Date parsing for `date` parameters
//!
//! Accepted inputs:
//!
//! - RFC 3339 timestamps (`2024-03-01T10:00:00+02:00`)
//! - `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
//! - `now`, `today`, `yesterday`, `tomorrow`
//! - `N <unit>s ago` and `in N <unit>s` with second, minute, hour, day, week
//!
//! Timestamps without a zone are read as UTC.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use thiserror::Error;

/// Upper bound for relative offsets (roughly a century)
const MAX_RELATIVE_SECONDS: i64 = 100 * 366 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse date '{0}'")]
pub struct DateParseError(pub String);

/// Parse a date relative to the current time
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    parse_date_relative_to(input, Utc::now())
}

/// Parse a date, resolving relative expressions against `now`
pub fn parse_date_relative_to(
    input: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();
    let fail = || DateParseError(input.to_string());

    match trimmed.to_ascii_lowercase().as_str() {
        "now" => return Ok(now),
        "today" => return start_of_day(now, 0).ok_or_else(fail),
        "yesterday" => return start_of_day(now, -1).ok_or_else(fail),
        "tomorrow" => return start_of_day(now, 1).ok_or_else(fail),
        _ => {}
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            let naive = date.and_hms_opt(0, 0, 0).ok_or_else(fail)?;
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    parse_relative(trimmed, now).ok_or_else(fail)
}

/// Canonical string form stored in parsed parameters
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn start_of_day(now: DateTime<Utc>, offset_days: i64) -> Option<DateTime<Utc>> {
    let day = now.date_naive().and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&day) + Duration::days(offset_days))
}

fn relative_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(in\s+)?(\d+)\s+(second|minute|hour|day|week)s?(\s+ago)?$")
            .expect("relative date pattern is valid")
    })
}

fn parse_relative(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = relative_pattern().captures(input)?;
    let future = caps.get(1).is_some();
    let past = caps.get(4).is_some();
    if future == past {
        return None;
    }

    let amount: i64 = caps.get(2)?.as_str().parse().ok()?;
    let unit_seconds = match caps.get(3)?.as_str().to_ascii_lowercase().as_str() {
        "second" => 1,
        "minute" => 60,
        "hour" => 3600,
        "day" => 86_400,
        "week" => 604_800,
        _ => return None,
    };
    let seconds = amount.checked_mul(unit_seconds)?;
    if seconds > MAX_RELATIVE_SECONDS {
        return None;
    }

    let offset = Duration::seconds(seconds);
    Some(if future { now + offset } else { now - offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 13, 30, 0).unwrap()
    }

    #[test]
    fn test_absolute_formats() {
        let now = fixed_now();
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        assert_eq!(parse_date_relative_to("2024-01-02", now).unwrap(), expected);
        assert_eq!(parse_date_relative_to("2024/01/02", now).unwrap(), expected);
        assert_eq!(
            parse_date_relative_to("2024-01-02T00:00:00Z", now).unwrap(),
            expected
        );
        assert_eq!(
            parse_date_relative_to("2024-01-02 05:06:07", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 5, 6, 7).unwrap()
        );
    }

    #[test]
    fn test_rfc3339_offset_is_normalized() {
        let parsed = parse_date_relative_to("2024-01-02T02:00:00+02:00", fixed_now()).unwrap();
        assert_eq!(format_date(&parsed), "2024-01-02T00:00:00Z");
    }

    #[test]
    fn test_named_days() {
        let now = fixed_now();
        assert_eq!(parse_date_relative_to("now", now).unwrap(), now);
        assert_eq!(
            parse_date_relative_to("Today", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date_relative_to("yesterday", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date_relative_to("tomorrow", now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_relative_offsets() {
        let now = fixed_now();
        assert_eq!(
            parse_date_relative_to("2 days ago", now).unwrap(),
            now - Duration::days(2)
        );
        assert_eq!(
            parse_date_relative_to("in 1 week", now).unwrap(),
            now + Duration::weeks(1)
        );
        assert_eq!(
            parse_date_relative_to("3 hours ago", now).unwrap(),
            now - Duration::hours(3)
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let now = fixed_now();
        assert!(parse_date_relative_to("next tuesday", now).is_err());
        assert!(parse_date_relative_to("in 2 days ago", now).is_err());
        assert!(parse_date_relative_to("5 days", now).is_err());
        assert!(parse_date_relative_to("2024-13-45", now).is_err());
        assert!(parse_date_relative_to("99999999999 weeks ago", now).is_err());
    }
}
