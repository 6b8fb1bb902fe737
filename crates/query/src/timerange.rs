//! Time ranges and date math
//!
//! A [`TimeRange`] holds the bounds the user picked, as written: absolute
//! timestamps or relative expressions like `now-7d/d`. [`to_absolute_dates`]
//! resolves both bounds against a reference instant.
//!
//! Date math grammar: an anchor (`now`, or a date followed by `||`), then any
//! number of `+N<unit>`, `-N<unit>` and `/<unit>` operations. Units are
//! `y M w d h H m s`. Rounding the upper bound rounds up to the last
//! millisecond of the unit.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// A time range as written by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Lower bound expression
    pub from: String,
    /// Upper bound expression
    pub to: String,
}

impl TimeRange {
    /// Create a time range from two bound expressions
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// The last `span` up to now, e.g. `last("24h")` is `now-24h` to `now`
    pub fn last(span: &str) -> Self {
        Self::new(format!("now-{}", span.trim()), "now")
    }

    /// Resolve against `now`
    pub fn to_absolute(&self, now: DateTime<Utc>) -> Result<AbsoluteTimeRange> {
        to_absolute_dates(self, now)
    }
}

/// A resolved time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsoluteTimeRange {
    /// Start (inclusive)
    pub min: DateTime<Utc>,
    /// End (inclusive)
    pub max: DateTime<Utc>,
}

impl AbsoluteTimeRange {
    /// Create a resolved range, rejecting inverted bounds
    pub fn new(min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Self> {
        if max < min {
            return Err(QueryError::InvalidTimeRange(format!(
                "end {} is before start {}",
                max.to_rfc3339(),
                min.to_rfc3339()
            )));
        }
        Ok(Self { min, max })
    }

    /// Length of the range
    pub fn duration(&self) -> Duration {
        self.max - self.min
    }

    /// Length of the range in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }
}

/// Resolve both bounds of `range` against `now`
///
/// The lower bound rounds down and the upper bound rounds up, so
/// `now/d`..`now/d` covers the whole current day.
pub fn to_absolute_dates(range: &TimeRange, now: DateTime<Utc>) -> Result<AbsoluteTimeRange> {
    let min = parse_date_math(&range.from, now, false)?;
    let max = parse_date_math(&range.to, now, true)?;
    AbsoluteTimeRange::new(min, max)
}

/// Resolve a single date math expression
pub fn parse_date_math(expr: &str, now: DateTime<Utc>, round_up: bool) -> Result<DateTime<Utc>> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(QueryError::InvalidDateMath("empty expression".to_string()));
    }

    let (anchor, math) = if let Some(rest) = expr.strip_prefix("now") {
        (now, rest)
    } else if let Some((date, rest)) = expr.split_once("||") {
        (parse_absolute(date)?, rest)
    } else {
        return parse_absolute(expr);
    };

    apply_math(anchor, math, round_up).ok_or_else(|| QueryError::InvalidDateMath(expr.to_string()))
}

/// Parse an absolute timestamp: RFC 3339, naive ISO 8601 (UTC), a bare
/// date, or epoch milliseconds
pub fn parse_absolute(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(start_of_day_naive(date));
    }
    if !s.is_empty()
        && s.chars().all(|c| c.is_ascii_digit())
        && let Ok(ms) = s.parse::<i64>()
        && let Some(dt) = Utc.timestamp_millis_opt(ms).single()
    {
        return Ok(dt);
    }
    Err(QueryError::InvalidDateMath(format!(
        "'{}' is not a date (use ISO 8601 or epoch milliseconds)",
        s
    )))
}

fn apply_math(mut dt: DateTime<Utc>, math: &str, round_up: bool) -> Option<DateTime<Utc>> {
    let chars: Vec<char> = math.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let op = chars[i];
        i += 1;
        match op {
            '/' => {
                let unit = *chars.get(i)?;
                i += 1;
                dt = if round_up {
                    round_up_to(dt, unit)?
                } else {
                    round_down(dt, unit)?
                };
            }
            '+' | '-' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                // `now+d` means one day
                let amount: i64 = if start == i {
                    1
                } else {
                    chars[start..i].iter().collect::<String>().parse().ok()?
                };
                let unit = *chars.get(i)?;
                i += 1;
                let amount = if op == '-' { -amount } else { amount };
                dt = shift(dt, amount, unit)?;
            }
            _ => return None,
        }
    }

    Some(dt)
}

fn shift(dt: DateTime<Utc>, amount: i64, unit: char) -> Option<DateTime<Utc>> {
    let shifted = match unit {
        'y' => shift_months(dt, amount.checked_mul(12)?)?,
        'M' => shift_months(dt, amount)?,
        'w' => dt.checked_add_signed(Duration::try_weeks(amount)?)?,
        'd' => dt.checked_add_signed(Duration::try_days(amount)?)?,
        'h' | 'H' => dt.checked_add_signed(Duration::try_hours(amount)?)?,
        'm' => dt.checked_add_signed(Duration::try_minutes(amount)?)?,
        's' => dt.checked_add_signed(Duration::try_seconds(amount)?)?,
        _ => return None,
    };
    Some(shifted)
}

fn round_down(dt: DateTime<Utc>, unit: char) -> Option<DateTime<Utc>> {
    let rounded = match unit {
        'y' => start_of_year(dt)?,
        'M' => start_of_month(dt)?,
        'w' => start_of_week(dt)?,
        'd' => start_of_day(dt),
        'h' | 'H' => dt.with_nanosecond(0)?.with_second(0)?.with_minute(0)?,
        'm' => dt.with_nanosecond(0)?.with_second(0)?,
        's' => dt.with_nanosecond(0)?,
        _ => return None,
    };
    Some(rounded)
}

fn round_up_to(dt: DateTime<Utc>, unit: char) -> Option<DateTime<Utc>> {
    let start = round_down(dt, unit)?;
    let next = shift(start, 1, unit)?;
    next.checked_sub_signed(Duration::milliseconds(1))
}

// =============================================================================
// Calendar helpers
// =============================================================================

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day_naive(dt.date_naive())
}

fn start_of_day_naive(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Weeks start on Monday
fn start_of_week(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let days_from_monday = dt.weekday().num_days_from_monday();
    let monday = dt.checked_sub_signed(Duration::days(days_from_monday as i64))?;
    Some(start_of_day(monday))
}

fn start_of_month(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    dt.date_naive().with_day(1).map(start_of_day_naive)
}

fn start_of_year(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(dt.year(), 1, 1).map(start_of_day_naive)
}

/// Shift by calendar months, clamping the day to the end of the target month
/// (Mar 31 - 1M = Feb 28/29). `None` once the target year leaves chrono's range.
fn shift_months(dt: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let total_months = (dt.year() as i64 * 12 + dt.month0() as i64).checked_add(months)?;
    let year = i32::try_from(total_months.div_euclid(12)).ok()?;
    let month = total_months.rem_euclid(12) as u32 + 1;

    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let day = first
        .with_day(dt.day())
        .or_else(|| last_day_of_month(first))?;
    Some(day.and_time(dt.time()).and_utc())
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = (date.year(), date.month());
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next_month.map(|d| d - Duration::days(1))
}
