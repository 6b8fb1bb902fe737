//! Aggregation error types

use quarry_query::{FieldKind, QueryError};
use thiserror::Error;

/// Errors raised while configuring aggregations, resolving intervals or
/// tabifying responses
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggError {
    /// A pipeline or ordering parameter names an aggregation that is not
    /// defined before it
    #[error("aggregation '{agg_id}' references '{target}', which is not defined before it")]
    DanglingAggReference {
        /// Referencing aggregation
        agg_id: String,
        /// Referenced id
        target: String,
    },

    /// Interval text is not `<n><unit>` with a known unit and n >= 1
    #[error("invalid interval '{0}' (expected e.g. 30s, 5m, 1h, 1d, 1w, 1M, 1y)")]
    InvalidIntervalFormat(String),

    /// Calendar units (M, q, y) only support a multiplier of 1
    #[error("invalid calendar interval '{0}': calendar units only support a multiplier of 1")]
    InvalidCalendarInterval(String),

    /// A parameter has the wrong type or an unusable value
    #[error("aggregation '{agg_id}': invalid parameter '{param}': {reason}")]
    InvalidParam {
        agg_id: String,
        param: String,
        reason: String,
    },

    /// A required parameter is absent
    #[error("aggregation '{agg_id}': missing required parameter '{param}'")]
    MissingParam { agg_id: String, param: String },

    /// The field is not part of the index pattern
    #[error("aggregation '{agg_id}': field '{field}' does not exist in the index pattern")]
    UnknownField { agg_id: String, field: String },

    /// The field exists but its type is not accepted by the aggregation
    #[error("aggregation '{agg_id}': {agg_type} does not accept {kind:?} field '{field}'")]
    FieldKindMismatch {
        agg_id: String,
        agg_type: String,
        field: String,
        kind: FieldKind,
    },

    /// Two aggregations share an id
    #[error("duplicate aggregation id '{0}'")]
    DuplicateAggId(String),

    /// IPv4 CIDR mask could not be parsed
    #[error("invalid CIDR mask '{0}'")]
    InvalidCidr(String),

    /// The response does not have the shape the aggregations imply
    #[error("unexpected response shape at '{path}': {reason}")]
    TabifyShape { path: String, reason: String },

    /// Building a sub-query (filters aggregation) failed
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl AggError {
    /// Create an InvalidParam error
    pub fn invalid_param(
        agg_id: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            agg_id: agg_id.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Create a TabifyShape error
    pub fn shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TabifyShape {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for aggregation operations
pub type Result<T> = std::result::Result<T, AggError>;
