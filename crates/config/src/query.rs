//! Query building configuration
//!
//! Settings consulted when lowering KQL/lucene queries and filters
//! into the backend query DSL.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Query languages the engine recognizes
pub const KNOWN_LANGUAGES: &[&str] = &["kuery", "lucene", "sql", "ppl"];

/// Query configuration
///
/// # Example
///
/// ```toml
/// [query]
/// default_language = "kuery"
/// allow_leading_wildcards = true
/// ignore_filter_if_field_not_in_index = false
/// strict_field_resolution = false
/// date_format_tz = "America/New_York"
///
/// [query.query_string_options]
/// analyze_wildcard = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Language used when a query does not name one
    /// Default: "kuery"
    pub default_language: String,

    /// Allow wildcards at the start of a term (`*foo`)
    /// Default: true
    pub allow_leading_wildcards: bool,

    /// Options merged into every `query_string` clause
    /// Default: `{ analyze_wildcard = true }`
    pub query_string_options: Map<String, Value>,

    /// Drop filters whose field is not part of the target index pattern
    /// Default: false
    pub ignore_filter_if_field_not_in_index: bool,

    /// Fail instead of falling back to multi-field match for unknown fields
    /// Default: false
    pub strict_field_resolution: bool,

    /// Time zone attached to date ranges and query_string clauses
    /// Default: none (backend default, UTC)
    pub date_format_tz: Option<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let mut query_string_options = Map::new();
        query_string_options.insert("analyze_wildcard".to_string(), Value::Bool(true));

        Self {
            default_language: "kuery".to_string(),
            allow_leading_wildcards: true,
            query_string_options,
            ignore_filter_if_field_not_in_index: false,
            strict_field_resolution: false,
            date_format_tz: None,
        }
    }
}
