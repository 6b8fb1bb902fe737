//! Lucene query string lowering

use serde_json::{Value, json};

/// Lower a lucene query string to a DSL clause
///
/// The empty string matches everything. A string holding a JSON object is
/// taken as raw DSL; anything else becomes a `query_string` clause.
pub fn lucene_string_to_dsl(query: &str) -> Value {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return json!({ "match_all": {} });
    }
    if trimmed.starts_with('{')
        && let Ok(raw @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed)
    {
        return raw;
    }
    json!({ "query_string": { "query": query } })
}
