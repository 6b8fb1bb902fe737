//! Tests for KQL lowering

use serde_json::{Value, json};

use crate::builder::OpenSearchQueryConfig;
use crate::error::QueryError;
use crate::field::{Field, FieldKind, IndexPattern};
use crate::kuery::{parse, to_structured_query};

fn logs() -> IndexPattern {
    IndexPattern::new("logs", "logs-*")
        .with_time_field("@timestamp")
        .with_field(Field::new("@timestamp", FieldKind::Date))
        .with_field(Field::new("status", FieldKind::Number))
        .with_field(Field::new("service", FieldKind::String))
        .with_field(Field::new("message", FieldKind::String).not_aggregatable())
        .with_field(Field::new("machine.os", FieldKind::String))
        .with_field(Field::new("machine.ram", FieldKind::Number))
}

fn lower(query: &str) -> Value {
    lower_with(query, &OpenSearchQueryConfig::default())
}

fn lower_with(query: &str, config: &OpenSearchQueryConfig) -> Value {
    let ast = parse(query).unwrap();
    to_structured_query(&ast, Some(&logs()), config).unwrap()
}

#[test]
fn test_empty_is_match_all() {
    assert_eq!(lower(""), json!({ "match_all": {} }));
}

#[test]
fn test_field_value_is_match() {
    assert_eq!(lower("status:500"), json!({ "match": { "status": 500 } }));
}

#[test]
fn test_quoted_is_match_phrase() {
    assert_eq!(
        lower(r#"service:"checkout""#),
        json!({ "match_phrase": { "service": "checkout" } })
    );
}

#[test]
fn test_free_text() {
    assert_eq!(
        lower("timeout"),
        json!({ "multi_match": { "query": "timeout", "type": "best_fields", "lenient": true } })
    );
    assert_eq!(
        lower(r#""connection reset""#),
        json!({ "multi_match": { "query": "connection reset", "type": "phrase", "lenient": true } })
    );
    assert_eq!(lower("*"), json!({ "match_all": {} }));
}

#[test]
fn test_boolean_structure() {
    assert_eq!(
        lower("status:500 or not service:cart"),
        json!({
            "bool": {
                "should": [
                    { "match": { "status": 500 } },
                    { "bool": { "must_not": [ { "match": { "service": "cart" } } ] } }
                ],
                "minimum_should_match": 1
            }
        })
    );
}

#[test]
fn test_exists() {
    assert_eq!(
        lower("service:*"),
        json!({ "exists": { "field": "service" } })
    );
}

#[test]
fn test_wildcard_value() {
    assert_eq!(
        lower("service:check*"),
        json!({ "query_string": { "fields": ["service"], "query": "check*" } })
    );
}

#[test]
fn test_wildcard_field_expands() {
    assert_eq!(
        lower("machine.*:linux"),
        json!({
            "bool": {
                "should": [
                    { "match": { "machine.os": "linux" } },
                    { "match": { "machine.ram": "linux" } }
                ],
                "minimum_should_match": 1
            }
        })
    );
}

#[test]
fn test_range() {
    assert_eq!(
        lower("status >= 500"),
        json!({ "range": { "status": { "gte": 500 } } })
    );
}

#[test]
fn test_date_range_gets_time_zone() {
    let config = OpenSearchQueryConfig {
        date_format_tz: Some("Europe/Berlin".to_string()),
        ..Default::default()
    };
    assert_eq!(
        lower_with(r#"@timestamp < "2024-01-01""#, &config),
        json!({ "range": { "@timestamp": { "lt": "2024-01-01", "time_zone": "Europe/Berlin" } } })
    );
    // Non-date fields never get one
    assert_eq!(
        lower_with("status > 1", &config),
        json!({ "range": { "status": { "gt": 1 } } })
    );
}

#[test]
fn test_date_equality_is_range() {
    assert_eq!(
        lower(r#"@timestamp:"2024-01-01""#),
        json!({ "range": { "@timestamp": { "gte": "2024-01-01", "lte": "2024-01-01" } } })
    );
}

#[test]
fn test_unknown_field_falls_back() {
    assert_eq!(
        lower("statsu:500"),
        json!({
            "multi_match": {
                "query": 500,
                "fields": ["service", "message", "machine.os"],
                "type": "best_fields",
                "lenient": true
            }
        })
    );
}

#[test]
fn test_unknown_field_strict() {
    let config = OpenSearchQueryConfig {
        strict_field_resolution: true,
        ..Default::default()
    };
    let ast = parse("statsu:500").unwrap();
    let err = to_structured_query(&ast, Some(&logs()), &config).unwrap_err();
    assert_eq!(
        err,
        QueryError::FieldResolution {
            field: "statsu".to_string(),
            index: "logs-*".to_string(),
        }
    );
}

#[test]
fn test_no_index_pattern_takes_names_as_written() {
    let ast = parse("anything:42 and x*:y").unwrap();
    let dsl = to_structured_query(&ast, None, &OpenSearchQueryConfig::default()).unwrap();
    assert_eq!(
        dsl,
        json!({
            "bool": {
                "must": [
                    { "match": { "anything": 42 } },
                    { "multi_match": { "query": "y", "type": "best_fields", "lenient": true } }
                ]
            }
        })
    );
}
