//! Time filter extraction
//!
//! A range filter on the index pattern's time field can be lifted out of the
//! filter bar and turned into the global time range.

use chrono::{TimeZone, Utc};
use serde_json::Value;

use super::Filter;
use crate::error::{QueryError, Result};
use crate::timerange::TimeRange;

/// Split the first range filter on `time_field` out of `filters`
///
/// Returns the time filter (if any) and the remaining filters in order.
pub fn extract_time_filter(time_field: &str, filters: &[Filter]) -> (Option<Filter>, Vec<Filter>) {
    let mut time_filter = None;
    let mut rest = Vec::with_capacity(filters.len());

    for filter in filters {
        if time_filter.is_none() && range_field(filter) == Some(time_field) {
            time_filter = Some(filter.clone());
        } else {
            rest.push(filter.clone());
        }
    }

    (time_filter, rest)
}

/// Convert a range filter into a time range
///
/// Epoch-millisecond bounds are rendered as RFC 3339; string bounds are kept
/// as written. Both bounds must be present.
pub fn convert_range_filter_to_time_range(filter: &Filter) -> Result<TimeRange> {
    let Some(field) = range_field(filter) else {
        return Err(QueryError::InvalidTimeRange(
            "filter is not a range filter".to_string(),
        ));
    };
    let bounds = filter
        .query
        .get("range")
        .and_then(|r| r.get(field))
        .ok_or_else(|| QueryError::InvalidTimeRange("range filter has no bounds".to_string()))?;

    let from = bounds.get("gte").or_else(|| bounds.get("gt"));
    let to = bounds.get("lte").or_else(|| bounds.get("lt"));
    match (from, to) {
        (Some(from), Some(to)) => Ok(TimeRange::new(bound_text(from)?, bound_text(to)?)),
        _ => Err(QueryError::InvalidTimeRange(format!(
            "range filter on '{}' must have both bounds",
            field
        ))),
    }
}

/// The time range to switch to when a time filter is applied
///
/// Falls back to `current` when the filter does not describe a usable range.
pub fn change_time_filter(current: &TimeRange, filter: &Filter) -> TimeRange {
    match convert_range_filter_to_time_range(filter) {
        Ok(range) => range,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unusable time filter");
            current.clone()
        }
    }
}

fn range_field(filter: &Filter) -> Option<&str> {
    let range = filter.query.get("range")?.as_object()?;
    if range.len() != 1 {
        return None;
    }
    range.keys().next().map(String::as_str)
}

fn bound_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .ok_or_else(|| QueryError::InvalidTimeRange(format!("bound {} is not a timestamp", n))),
        other => Err(QueryError::InvalidTimeRange(format!(
            "bound {} is not a timestamp",
            other
        ))),
    }
}
