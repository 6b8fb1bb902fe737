//! Date histogram interval parsing and resolution
//!
//! Interval text is `<n><unit>`:
//! - Fixed units `ms s m h d w` take any integer multiplier >= 1
//! - Calendar units `M q y` only take a multiplier of 1
//!
//! `auto` resolves against the time range: the smallest ladder entry that
//! yields at most `bar_target` buckets. Explicit intervals that would exceed
//! `max_buckets` are scaled up to the smallest ladder entry that fits.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value, json};

use quarry_query::AbsoluteTimeRange;

use crate::error::{AggError, Result};

/// Interval text meaning "pick for me"
pub const AUTO: &str = "auto";

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Candidate intervals for automatic selection, ascending
pub const INTERVAL_LADDER: &[&str] = &[
    "100ms", "1s", "5s", "10s", "30s", "1m", "5m", "10m", "15m", "30m", "1h", "3h", "12h", "1d",
    "1w", "1M", "1y",
];

/// Interval unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IntervalUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl IntervalUnit {
    /// Parse a unit suffix (case-sensitive: `m` is minutes, `M` is months)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ms" => Some(Self::Millisecond),
            "s" => Some(Self::Second),
            "m" => Some(Self::Minute),
            "h" => Some(Self::Hour),
            "d" => Some(Self::Day),
            "w" => Some(Self::Week),
            "M" => Some(Self::Month),
            "q" => Some(Self::Quarter),
            "y" => Some(Self::Year),
            _ => None,
        }
    }

    /// Unit suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Millisecond => "ms",
            Self::Second => "s",
            Self::Minute => "m",
            Self::Hour => "h",
            Self::Day => "d",
            Self::Week => "w",
            Self::Month => "M",
            Self::Quarter => "q",
            Self::Year => "y",
        }
    }

    /// Whether the unit has variable length
    pub fn is_calendar(&self) -> bool {
        matches!(self, Self::Month | Self::Quarter | Self::Year)
    }

    /// Length in milliseconds (calendar units use 30/90/365 days)
    pub fn approx_ms(&self) -> u64 {
        match self {
            Self::Millisecond => 1,
            Self::Second => MS_PER_SECOND,
            Self::Minute => MS_PER_MINUTE,
            Self::Hour => MS_PER_HOUR,
            Self::Day => MS_PER_DAY,
            Self::Week => 7 * MS_PER_DAY,
            Self::Month => 30 * MS_PER_DAY,
            Self::Quarter => 90 * MS_PER_DAY,
            Self::Year => 365 * MS_PER_DAY,
        }
    }

    /// Human name for labels
    pub fn display_name(&self, plural: bool) -> &'static str {
        match (self, plural) {
            (Self::Millisecond, false) => "millisecond",
            (Self::Millisecond, true) => "milliseconds",
            (Self::Second, false) => "second",
            (Self::Second, true) => "seconds",
            (Self::Minute, false) => "minute",
            (Self::Minute, true) => "minutes",
            (Self::Hour, false) => "hour",
            (Self::Hour, true) => "hours",
            (Self::Day, false) => "day",
            (Self::Day, true) => "days",
            (Self::Week, false) => "week",
            (Self::Week, true) => "weeks",
            (Self::Month, false) => "month",
            (Self::Month, true) => "months",
            (Self::Quarter, false) => "quarter",
            (Self::Quarter, true) => "quarters",
            (Self::Year, false) => "year",
            (Self::Year, true) => "years",
        }
    }
}

/// A parsed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ParsedInterval {
    pub value: u64,
    pub unit: IntervalUnit,
}

impl ParsedInterval {
    /// Length in milliseconds
    pub fn to_ms(&self) -> u64 {
        self.value.saturating_mul(self.unit.approx_ms())
    }

    /// Human description, e.g. "15 minutes" or "day"
    pub fn describe(&self) -> String {
        if self.value == 1 {
            self.unit.display_name(false).to_string()
        } else {
            format!("{} {}", self.value, self.unit.display_name(true))
        }
    }
}

impl fmt::Display for ParsedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

/// How the backend interprets an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    Fixed,
    Calendar,
}

/// An interval ready for a date histogram request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenSearchInterval {
    pub value: u64,
    pub unit: IntervalUnit,
    pub kind: IntervalKind,
}

/// Parse interval text such as `15m` or `1M`
///
/// A missing multiplier means 1 (`d` is one day).
pub fn parse_interval(s: &str) -> Result<ParsedInterval> {
    let text = s.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| AggError::InvalidIntervalFormat(s.to_string()))?;
    let (digits, unit) = text.split_at(split);

    let unit = IntervalUnit::parse(unit).ok_or_else(|| AggError::InvalidIntervalFormat(s.to_string()))?;
    let value = if digits.is_empty() {
        1
    } else {
        digits
            .parse::<u64>()
            .map_err(|_| AggError::InvalidIntervalFormat(s.to_string()))?
    };

    if value == 0 {
        return Err(AggError::InvalidIntervalFormat(s.to_string()));
    }
    if unit.is_calendar() && value != 1 {
        return Err(AggError::InvalidCalendarInterval(s.to_string()));
    }
    Ok(ParsedInterval { value, unit })
}

/// Parse interval text and classify it as fixed or calendar
pub fn parse_opensearch_interval(s: &str) -> Result<OpenSearchInterval> {
    let parsed = parse_interval(s)?;
    let kind = if parsed.unit.is_calendar() {
        IntervalKind::Calendar
    } else {
        IntervalKind::Fixed
    };
    Ok(OpenSearchInterval {
        value: parsed.value,
        unit: parsed.unit,
        kind,
    })
}

/// Whether `s` is `auto` or a valid interval
pub fn is_valid_interval(s: &str) -> bool {
    s.trim() == AUTO || parse_interval(s).is_ok()
}

/// Whether `s` is a valid backend interval (`auto` is not)
pub fn is_valid_opensearch_interval(s: &str) -> bool {
    parse_opensearch_interval(s).is_ok()
}

/// An entry of the interval picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntervalOption {
    pub value: &'static str,
    pub display: &'static str,
}

/// Intervals offered to users, `auto` first
pub fn interval_options() -> Vec<IntervalOption> {
    [
        (AUTO, "Auto"),
        ("1ms", "Millisecond"),
        ("1s", "Second"),
        ("1m", "Minute"),
        ("1h", "Hour"),
        ("1d", "Day"),
        ("1w", "Week"),
        ("1M", "Month"),
        ("1y", "Year"),
    ]
    .into_iter()
    .map(|(value, display)| IntervalOption { value, display })
    .collect()
}

/// DSL interval key/value for a date histogram
///
/// `{"calendar_interval": "1M"}` or `{"fixed_interval": "15m"}`.
pub fn date_histogram_interval(s: &str) -> Result<Map<String, Value>> {
    let interval = parse_opensearch_interval(s)?;
    let key = match interval.kind {
        IntervalKind::Calendar => "calendar_interval",
        IntervalKind::Fixed => "fixed_interval",
    };
    let mut out = Map::new();
    out.insert(
        key.to_string(),
        json!(format!("{}{}", interval.value, interval.unit.as_str())),
    );
    Ok(out)
}

// =============================================================================
// Resolution
// =============================================================================

/// Outcome of resolving an interval against a time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedInterval {
    /// Interval to request
    pub interval: ParsedInterval,
    /// Picked from the ladder because `auto` was requested
    pub auto: bool,
    /// Widened because the requested interval produced too many buckets
    pub scaled: bool,
    /// Expected bucket count over the range
    pub buckets: u64,
}

/// Resolve `interval` (text or `auto`) for `range`
pub fn resolve_interval(
    interval: &str,
    range: &AbsoluteTimeRange,
    bar_target: u32,
    max_buckets: u32,
) -> Result<ResolvedInterval> {
    let duration_ms = u64::try_from(range.duration_ms()).unwrap_or(0);

    if interval.trim() == AUTO {
        let picked = ladder_entry(duration_ms, u64::from(bar_target.max(1)))?;
        return Ok(ResolvedInterval {
            interval: picked,
            auto: true,
            scaled: false,
            buckets: bucket_count(duration_ms, picked.to_ms()),
        });
    }

    let requested = parse_interval(interval)?;
    let buckets = bucket_count(duration_ms, requested.to_ms());
    if buckets <= u64::from(max_buckets) {
        return Ok(ResolvedInterval {
            interval: requested,
            auto: false,
            scaled: false,
            buckets,
        });
    }

    let mut scaled = ladder_entry(duration_ms, u64::from(max_buckets.max(1)))?;
    if scaled.to_ms() < requested.to_ms() {
        scaled = requested;
    }
    tracing::debug!(
        requested = %requested,
        scaled = %scaled,
        buckets,
        max_buckets,
        "scaled interval to stay under bucket limit"
    );
    Ok(ResolvedInterval {
        interval: scaled,
        auto: false,
        scaled: true,
        buckets: bucket_count(duration_ms, scaled.to_ms()),
    })
}

/// Smallest ladder entry giving at most `target` buckets (largest entry if none)
fn ladder_entry(duration_ms: u64, target: u64) -> Result<ParsedInterval> {
    let mut last = None;
    for text in INTERVAL_LADDER {
        let entry = parse_interval(text)?;
        if bucket_count(duration_ms, entry.to_ms()) <= target {
            return Ok(entry);
        }
        last = Some(entry);
    }
    last.ok_or_else(|| AggError::InvalidIntervalFormat(AUTO.to_string()))
}

fn bucket_count(duration_ms: u64, interval_ms: u64) -> u64 {
    if interval_ms == 0 {
        return u64::MAX;
    }
    duration_ms.div_ceil(interval_ms)
}
