//! Response classification
//!
//! A backend answer is one of:
//! - an error (`error` key, or every shard failed)
//! - partial (timed out, some shards failed, or still running)
//! - complete

use serde_json::Value;

use crate::error::BackendErrorKind;

fn shard_counts(response: &Value) -> (u64, u64) {
    let shards = response.get("_shards");
    let count = |key: &str| {
        shards
            .and_then(|s| s.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    (count("successful"), count("failed"))
}

/// Whether the backend answered with an error
pub fn is_error_response(response: &Value) -> bool {
    let Some(body) = response.as_object() else {
        return true;
    };
    if body.get("error").is_some_and(|e| !e.is_null()) {
        return true;
    }
    if body.get("status").and_then(Value::as_u64).is_some_and(|s| s >= 400) {
        return true;
    }
    let (successful, failed) = shard_counts(response);
    failed > 0 && successful == 0
}

/// Whether the answer is usable but incomplete
pub fn is_partial_response(response: &Value) -> bool {
    if is_error_response(response) {
        return false;
    }
    let flag = |key: &str| response.get(key).and_then(Value::as_bool).unwrap_or(false);
    let (_, failed) = shard_counts(response);
    flag("timed_out") || flag("is_partial") || flag("is_running") || failed > 0
}

/// Whether the answer is complete and error free
pub fn is_complete_response(response: &Value) -> bool {
    !is_error_response(response) && !is_partial_response(response)
}

/// Error kind of a failed or partially failed response
pub fn backend_error_kind(response: &Value) -> BackendErrorKind {
    if mentions_painless(response) {
        BackendErrorKind::Painless
    } else {
        BackendErrorKind::General
    }
}

/// A script_exception, or any error object tagged `"lang": "painless"`
fn mentions_painless(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            let script_error = map.get("type").and_then(Value::as_str) == Some("script_exception");
            let painless = map.get("lang").and_then(Value::as_str) == Some("painless");
            script_error || painless || map.values().any(mentions_painless)
        }
        Value::Array(items) => items.iter().any(mentions_painless),
        _ => false,
    }
}

/// Best human-readable reason in an error response
pub fn error_message(response: &Value) -> String {
    let error = response.get("error");
    if let Some(reason) = error.and_then(Value::as_str) {
        return reason.to_string();
    }

    let candidates = [
        error.and_then(|e| e.get("root_cause")).and_then(|r| r.get(0)),
        error,
        response
            .get("_shards")
            .and_then(|s| s.get("failures"))
            .and_then(|f| f.get(0))
            .and_then(|f| f.get("reason")),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Some(reason) = candidate.get("reason").and_then(Value::as_str) {
            return reason.to_string();
        }
    }
    "unknown backend error".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification() {
        let complete = json!({"took": 2, "timed_out": false, "_shards": {"total": 2, "successful": 2, "failed": 0}});
        assert!(is_complete_response(&complete));
        assert!(!is_partial_response(&complete));
        assert!(!is_error_response(&complete));

        let partial = json!({"took": 2, "_shards": {"total": 2, "successful": 1, "failed": 1}});
        assert!(is_partial_response(&partial));
        assert!(!is_complete_response(&partial));

        let timed_out = json!({"timed_out": true, "_shards": {"successful": 2, "failed": 0}});
        assert!(is_partial_response(&timed_out));

        let all_failed = json!({"_shards": {"total": 2, "successful": 0, "failed": 2}});
        assert!(is_error_response(&all_failed));
        assert!(!is_partial_response(&all_failed));

        assert!(is_error_response(&json!({"error": "boom", "status": 500})));
        assert!(is_error_response(&json!("not an object")));
    }

    #[test]
    fn test_painless_detection() {
        let painless = json!({
            "error": {
                "root_cause": [{"type": "script_exception", "reason": "runtime error"}],
                "type": "search_phase_execution_exception",
                "failed_shards": [{"reason": {"type": "script_exception", "lang": "painless"}}]
            },
            "status": 400
        });
        assert_eq!(backend_error_kind(&painless), BackendErrorKind::Painless);
        assert_eq!(error_message(&painless), "runtime error");

        let general = json!({"error": {"type": "index_not_found_exception", "reason": "no such index [x]"}});
        assert_eq!(backend_error_kind(&general), BackendErrorKind::General);
        assert_eq!(error_message(&general), "no such index [x]");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(&json!({"error": "plain"})), "plain");
        assert_eq!(
            error_message(&json!({"_shards": {"failures": [{"reason": {"reason": "shard down"}}]}})),
            "shard down"
        );
        assert_eq!(error_message(&json!({})), "unknown backend error");
    }
}
