//! Request inspector
//!
//! Bounded log of finished requests, plus the label/value rows shown in
//! a request inspector.

use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use quarry_query::IndexPattern;

/// Lifecycle state of a search request
///
/// `Created -> Dispatched -> Completed | Aborted | TimedOut | Failed`.
/// A created request may also be aborted without being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Created,
    Dispatched,
    Completed,
    Aborted,
    TimedOut,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Aborted | Self::TimedOut | Self::Failed
        )
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        match self {
            Self::Created => matches!(next, Self::Dispatched | Self::Aborted),
            Self::Dispatched => next.is_terminal(),
            _ => false,
        }
    }
}

/// One finished request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    pub id: u64,
    pub fingerprint: String,
    pub index: String,
    pub status: RequestStatus,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub request: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestRecord {
    /// Wall time from dispatch to termination
    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

/// Bounded log of finished requests, oldest dropped first
#[derive(Debug)]
pub struct Inspector {
    capacity: usize,
    records: Mutex<VecDeque<RequestRecord>>,
}

impl Inspector {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, record: RequestRecord) {
        let mut records = self.records.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// All records, oldest first
    pub fn records(&self) -> Vec<RequestRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<RequestRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }

    pub fn last(&self) -> Option<RequestRecord> {
        self.records.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

// =============================================================================
// Stats
// =============================================================================

/// One row of inspector stats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectorStat {
    pub label: String,
    pub value: String,
    pub description: String,
}

impl InspectorStat {
    fn new(label: &str, value: impl Into<String>, description: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
            description: description.to_string(),
        }
    }
}

/// Stats describing what was requested
pub fn get_request_inspector_stats(
    record: &RequestRecord,
    index: Option<&IndexPattern>,
) -> Vec<InspectorStat> {
    let mut stats = Vec::new();
    match index {
        Some(index) => {
            stats.push(InspectorStat::new(
                "Index pattern",
                &index.title,
                "The index pattern that connected to the OpenSearch indices.",
            ));
            stats.push(InspectorStat::new(
                "Index pattern ID",
                &index.id,
                "The ID in the saved objects index.",
            ));
        }
        None => stats.push(InspectorStat::new(
            "Index",
            &record.index,
            "The index expression the request was sent to.",
        )),
    }
    stats.push(InspectorStat::new(
        "Request timestamp",
        record.start.to_rfc3339_opts(SecondsFormat::Millis, true),
        "Time when the request started.",
    ));
    if let Some(preference) = &record.preference {
        stats.push(InspectorStat::new(
            "Preference",
            preference,
            "Shard copy routing sent with the request.",
        ));
    }
    stats.push(InspectorStat::new(
        "Status",
        record.status.as_str(),
        "How the request ended.",
    ));
    stats
}

/// Stats read from the response
///
/// Rows whose value the response does not carry are left out.
pub fn get_response_inspector_stats(record: &RequestRecord) -> Vec<InspectorStat> {
    let mut stats = Vec::new();
    let response = record.response.as_ref();

    if let Some(hits) = response
        .and_then(|r| r.pointer("/hits/hits"))
        .and_then(Value::as_array)
    {
        stats.push(InspectorStat::new(
            "Hits",
            hits.len().to_string(),
            "The number of documents returned by the query.",
        ));
    }

    let total = response.and_then(|r| r.pointer("/hits/total")).and_then(|t| {
        t.as_u64()
            .or_else(|| t.get("value").and_then(Value::as_u64))
    });
    if let Some(total) = total {
        stats.push(InspectorStat::new(
            "Hits (total)",
            total.to_string(),
            "The number of documents that match the query.",
        ));
    }

    if let Some(took) = response.and_then(|r| r.get("took")).and_then(Value::as_u64) {
        stats.push(InspectorStat::new(
            "Query time",
            format!("{}ms", took),
            "The time it took to process the query. Does not include the time to send the request or parse it in the browser.",
        ));
    }

    if record.status.is_terminal() {
        stats.push(InspectorStat::new(
            "Request time",
            format!("{}ms", record.duration_ms()),
            "The time of the request from dispatch to termination.",
        ));
    }
    stats
}
