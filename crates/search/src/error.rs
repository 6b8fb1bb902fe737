//! Search error types

use std::fmt;

use quarry_aggs::AggError;
use quarry_query::QueryError;
use serde::Serialize;

/// Kind of failure reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendErrorKind {
    /// Any backend failure
    General,
    /// A painless script failed (scripted fields, script queries)
    Painless,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Painless => write!(f, "painless"),
        }
    }
}

/// Errors that can occur while building or running a search
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// The request did not complete within its timeout
    #[error("search request {request_id} timed out after {timeout_ms}ms")]
    Timeout { request_id: u64, timeout_ms: u64 },

    /// The caller's signal fired before the request completed
    #[error("search request {request_id} was aborted")]
    Aborted { request_id: u64 },

    /// The backend reported a failure
    #[error("search request {request_id} failed ({kind}): {message}")]
    Backend {
        request_id: u64,
        kind: BackendErrorKind,
        message: String,
    },

    /// Query building failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Aggregation building or tabify failed
    #[error(transparent)]
    Agg(#[from] AggError),

    /// A saved search source could not be read or restored
    #[error("invalid saved search source: {0}")]
    SavedSource(String),
}

impl SearchError {
    /// Id of the request, for lifecycle errors
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::Timeout { request_id, .. }
            | Self::Aborted { request_id }
            | Self::Backend { request_id, .. } => Some(*request_id),
            Self::Query(_) | Self::Agg(_) | Self::SavedSource(_) => None,
        }
    }

    /// Whether this is a painless script failure
    pub fn is_painless(&self) -> bool {
        matches!(
            self,
            Self::Backend {
                kind: BackendErrorKind::Painless,
                ..
            }
        )
    }
}

/// Failure to reach the backend or read its answer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for search operations
pub type Result<T> = std::result::Result<T, SearchError>;
