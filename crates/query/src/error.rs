//! Query building error types

use thiserror::Error;

/// Errors raised while building filters, parsing queries, or lowering them
/// to the backend query DSL
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// A filter builder received an absent or malformed field/value
    #[error("invalid {filter_type} filter input: {reason}")]
    InvalidFilterInput {
        /// Filter type being built (phrase, range, ...)
        filter_type: &'static str,
        /// What was wrong with the input
        reason: String,
    },

    /// KQL text could not be parsed
    #[error("syntax error at position {position}: {message}")]
    QuerySyntax {
        /// Character offset into the original query string
        position: usize,
        /// Human-readable description
        message: String,
    },

    /// Field referenced by a query is absent from the index pattern
    /// (only raised under strict field resolution)
    #[error("field '{field}' does not exist in index pattern '{index}'")]
    FieldResolution {
        /// Field name as written in the query
        field: String,
        /// Index pattern title
        index: String,
    },

    /// Query language has no structured-query lowering
    #[error("query language '{0}' cannot be converted to a structured query")]
    UnsupportedLanguage(String),

    /// Time range bounds are inverted or unusable
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    /// Date math expression could not be parsed
    #[error("invalid date math expression: {0}")]
    InvalidDateMath(String),
}

impl QueryError {
    /// Create an InvalidFilterInput error
    pub fn invalid_filter(filter_type: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidFilterInput {
            filter_type,
            reason: reason.into(),
        }
    }

    /// Create a QuerySyntax error
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::QuerySyntax {
            position,
            message: message.into(),
        }
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
