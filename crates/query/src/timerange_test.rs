//! Tests for time ranges and date math

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::error::QueryError;
use crate::timerange::{TimeRange, parse_absolute, parse_date_math, to_absolute_dates};

fn now() -> DateTime<Utc> {
    // Wednesday
    Utc.with_ymd_and_hms(2024, 3, 13, 14, 35, 20).unwrap()
}

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[test]
fn test_now() {
    assert_eq!(parse_date_math("now", now(), false).unwrap(), now());
}

#[test]
fn test_relative_offsets() {
    assert_eq!(
        parse_date_math("now-7d", now(), false).unwrap(),
        ts("2024-03-06T14:35:20Z")
    );
    assert_eq!(
        parse_date_math("now+1h", now(), false).unwrap(),
        ts("2024-03-13T15:35:20Z")
    );
    assert_eq!(
        parse_date_math("now-15m", now(), false).unwrap(),
        ts("2024-03-13T14:20:20Z")
    );
}

#[test]
fn test_rounding_down() {
    assert_eq!(
        parse_date_math("now/d", now(), false).unwrap(),
        ts("2024-03-13T00:00:00Z")
    );
    assert_eq!(
        parse_date_math("now-1h/h", now(), false).unwrap(),
        ts("2024-03-13T13:00:00Z")
    );
    assert_eq!(
        parse_date_math("now/w", now(), false).unwrap(),
        ts("2024-03-11T00:00:00Z")
    );
    assert_eq!(
        parse_date_math("now/M", now(), false).unwrap(),
        ts("2024-03-01T00:00:00Z")
    );
    assert_eq!(
        parse_date_math("now/y", now(), false).unwrap(),
        ts("2024-01-01T00:00:00Z")
    );
}

#[test]
fn test_rounding_up() {
    assert_eq!(
        parse_date_math("now/d", now(), true).unwrap(),
        ts("2024-03-13T23:59:59.999Z")
    );
    assert_eq!(
        parse_date_math("now/M", now(), true).unwrap(),
        ts("2024-03-31T23:59:59.999Z")
    );
}

#[test]
fn test_month_arithmetic_clamps() {
    let end_of_march = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
    assert_eq!(
        parse_date_math("now-1M", end_of_march, false).unwrap(),
        ts("2024-02-29T12:00:00Z")
    );
    assert_eq!(
        parse_date_math("now-1y", end_of_march, false).unwrap(),
        ts("2023-03-31T12:00:00Z")
    );
}

#[test]
fn test_anchored_date() {
    assert_eq!(
        parse_date_math("2024-01-15||+1M/d", now(), false).unwrap(),
        ts("2024-02-15T00:00:00Z")
    );
}

#[test]
fn test_absolute_formats() {
    assert_eq!(
        parse_absolute("2024-01-15T10:00:00Z").unwrap(),
        ts("2024-01-15T10:00:00Z")
    );
    assert_eq!(
        parse_absolute("2024-01-15T10:00:00+02:00").unwrap(),
        ts("2024-01-15T08:00:00Z")
    );
    assert_eq!(
        parse_absolute("2024-01-15T10:00:00.250").unwrap(),
        ts("2024-01-15T10:00:00.250Z")
    );
    assert_eq!(parse_absolute("2024-01-15").unwrap(), ts("2024-01-15T00:00:00Z"));
    assert_eq!(parse_absolute("1705312800000").unwrap(), ts("2024-01-15T10:00:00Z"));
}

#[test]
fn test_invalid_expressions() {
    for expr in ["", "yesterday", "now-7x", "now-", "now/", "now*2d", "2024-13-45"] {
        assert!(
            matches!(
                parse_date_math(expr, now(), false),
                Err(QueryError::InvalidDateMath(_))
            ),
            "expected InvalidDateMath for {:?}",
            expr
        );
    }
}

#[test]
fn test_out_of_range_offsets() {
    for expr in [
        "now+178956970y",
        "now+300000y",
        "now-300000y",
        "now+9223372036854775807M",
        "now+768614336404564650y",
    ] {
        assert!(
            matches!(
                parse_date_math(expr, now(), false),
                Err(QueryError::InvalidDateMath(_))
            ),
            "expected InvalidDateMath for {:?}",
            expr
        );
    }
}

#[test]
fn test_rounding_past_the_last_year() {
    let last_year = NaiveDate::MAX.year();
    let end_of_time = Utc.with_ymd_and_hms(last_year, 6, 1, 0, 0, 0).unwrap();
    assert_eq!(
        parse_date_math("now/y", end_of_time, false).unwrap(),
        Utc.with_ymd_and_hms(last_year, 1, 1, 0, 0, 0).unwrap()
    );
    // The end of the year would need the first instant of the next one
    assert!(matches!(
        parse_date_math("now/y", end_of_time, true),
        Err(QueryError::InvalidDateMath(_))
    ));
}

#[test]
fn test_to_absolute_dates() {
    let range = TimeRange::new("now-24h", "now");
    let absolute = to_absolute_dates(&range, now()).unwrap();
    assert_eq!(absolute.max, now());
    assert_eq!(absolute.duration_ms(), 24 * 60 * 60 * 1000);
}

#[test]
fn test_to_absolute_dates_whole_day() {
    let absolute = TimeRange::new("now/d", "now/d").to_absolute(now()).unwrap();
    assert_eq!(absolute.min, ts("2024-03-13T00:00:00Z"));
    assert_eq!(absolute.max, ts("2024-03-13T23:59:59.999Z"));
}

#[test]
fn test_inverted_range() {
    let range = TimeRange::new("now", "now-1d");
    assert!(matches!(
        to_absolute_dates(&range, now()),
        Err(QueryError::InvalidTimeRange(_))
    ));
}

#[test]
fn test_last() {
    let range = TimeRange::last("15m");
    assert_eq!(range.from, "now-15m");
    assert_eq!(range.to, "now");
}
