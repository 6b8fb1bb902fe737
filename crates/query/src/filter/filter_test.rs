//! Tests for filter builders and helpers

use serde_json::json;

use crate::error::QueryError;
use crate::field::{Field, FieldKind, IndexPattern};
use crate::filter::{
    Filter, FilterState, FilterType, RangeParams, build_custom_filter, build_empty_filter,
    build_exists_filter, build_phrase_filter, build_phrases_filter, build_query_filter,
    build_range_filter, get_display_value_from_filter, get_phrase_filter_field,
    get_phrase_filter_value, is_filter_pinned,
};

fn index() -> IndexPattern {
    IndexPattern::new("logs", "logs-*")
        .with_time_field("@timestamp")
        .with_field(Field::new("@timestamp", FieldKind::Date))
        .with_field(Field::new("status", FieldKind::Number))
        .with_field(Field::new("service", FieldKind::String))
        .with_field(Field::new("bytes", FieldKind::Number))
}

fn field(name: &str) -> Field {
    index().field(name).cloned().unwrap()
}

#[test]
fn test_phrase_filter() {
    let filter = build_phrase_filter(&field("service"), "checkout", &index()).unwrap();

    assert_eq!(filter.query, json!({ "match_phrase": { "service": "checkout" } }));
    assert_eq!(filter.meta.filter_type, FilterType::Phrase);
    assert_eq!(filter.meta.key.as_deref(), Some("service"));
    assert_eq!(filter.meta.value.as_deref(), Some("checkout"));
    assert_eq!(filter.meta.index.as_deref(), Some("logs"));
    assert_eq!(filter.state, FilterState::App);
    assert!(!filter.meta.negate);
    assert!(!filter.meta.disabled);

    assert_eq!(get_phrase_filter_field(&filter), Some("service"));
    assert_eq!(get_phrase_filter_value(&filter), Some(&json!("checkout")));
}

#[test]
fn test_phrase_filter_rejects_bad_input() {
    let index = index();
    let err = build_phrase_filter(&field("service"), json!(null), &index).unwrap_err();
    assert!(matches!(
        err,
        QueryError::InvalidFilterInput {
            filter_type: "phrase",
            ..
        }
    ));

    assert!(build_phrase_filter(&field("service"), json!({"a": 1}), &index).is_err());
    assert!(build_phrase_filter(&Field::new(" ", FieldKind::String), "x", &index).is_err());
}

#[test]
fn test_phrases_filter() {
    let values = vec![json!("checkout"), json!("cart")];
    let filter = build_phrases_filter(&field("service"), &values, &index()).unwrap();

    assert_eq!(
        filter.query,
        json!({
            "bool": {
                "should": [
                    { "match_phrase": { "service": "checkout" } },
                    { "match_phrase": { "service": "cart" } }
                ],
                "minimum_should_match": 1
            }
        })
    );
    assert_eq!(filter.meta.value.as_deref(), Some("checkout, cart"));
    assert_eq!(filter.phrases_values(), values);
}

#[test]
fn test_phrases_filter_requires_values() {
    assert!(build_phrases_filter(&field("service"), &[], &index()).is_err());
    assert!(build_phrases_filter(&field("service"), &[json!(null)], &index()).is_err());
}

#[test]
fn test_range_filter() {
    let filter =
        build_range_filter(&field("bytes"), RangeParams::between(100, 200), &index()).unwrap();

    assert_eq!(
        filter.query,
        json!({ "range": { "bytes": { "gte": 100, "lte": 200 } } })
    );
    assert_eq!(filter.display_value(), "100 to 200");
}

#[test]
fn test_range_filter_open_ended_display() {
    let params = RangeParams {
        gt: Some(json!(10)),
        ..Default::default()
    };
    let filter = build_range_filter(&field("bytes"), params, &index()).unwrap();
    assert_eq!(filter.display_value(), "10 to +∞");
}

#[test]
fn test_range_filter_validation() {
    let index = index();
    assert!(build_range_filter(&field("bytes"), RangeParams::default(), &index).is_err());
    assert!(
        build_range_filter(&field("bytes"), RangeParams::between("low", "high"), &index).is_err()
    );

    // Numeric strings are fine on number fields
    assert!(build_range_filter(&field("bytes"), RangeParams::between("1", "2"), &index).is_ok());

    let with_format = RangeParams {
        format: Some("strict_date_optional_time".to_string()),
        ..RangeParams::between(1, 2)
    };
    assert!(build_range_filter(&field("bytes"), with_format.clone(), &index).is_err());

    let dated = RangeParams {
        format: with_format.format,
        ..RangeParams::between("2024-01-01", "2024-02-01")
    };
    assert!(build_range_filter(&field("@timestamp"), dated, &index).is_ok());
}

#[test]
fn test_exists_filter() {
    let filter = build_exists_filter(&field("service"), &index()).unwrap();
    assert_eq!(filter.query, json!({ "exists": { "field": "service" } }));
    assert!(filter.is_exists());
    assert_eq!(filter.display_value(), "exists");
}

#[test]
fn test_query_filter_types() {
    let index = index();
    let qs = build_query_filter(
        json!({ "query_string": { "query": "status:5*" } }),
        &index,
        None,
    )
    .unwrap();
    assert!(qs.is_query_string());
    assert_eq!(qs.display_value(), "status:5*");

    let custom = build_query_filter(json!({ "term": { "status": 500 } }), &index, None).unwrap();
    assert_eq!(custom.meta.filter_type, FilterType::Custom);

    assert!(build_query_filter(json!({}), &index, None).is_err());
    assert!(build_query_filter(json!("status:500"), &index, None).is_err());
}

#[test]
fn test_custom_filter_flags() {
    let filter = build_custom_filter(
        &index(),
        json!({ "term": { "status": 500 } }),
        true,
        true,
        Some("server errors".to_string()),
        FilterState::Global,
    )
    .unwrap();

    assert!(filter.meta.disabled);
    assert!(filter.meta.negate);
    assert!(is_filter_pinned(&filter));
    assert_eq!(get_display_value_from_filter(&filter), "server errors");
}

#[test]
fn test_empty_filter() {
    let pinned = build_empty_filter(true, Some(&index()));
    assert!(pinned.is_match_all());
    assert!(pinned.is_pinned());
    assert_eq!(pinned.meta.index.as_deref(), Some("logs"));

    let unpinned = build_empty_filter(false, None);
    assert!(!unpinned.is_pinned());
    assert!(unpinned.meta.index.is_none());
}

#[test]
fn test_helpers_return_new_values() {
    let original = build_phrase_filter(&field("status"), 500, &index()).unwrap();

    let negated = original.toggle_negated();
    let disabled = original.toggle_disabled();
    let pinned = original.pin();

    assert!(negated.meta.negate);
    assert!(disabled.meta.disabled);
    assert!(pinned.is_pinned());
    assert!(!original.meta.negate);
    assert!(!original.meta.disabled);
    assert!(!original.is_pinned());

    assert_eq!(negated.toggle_negated(), original);
    assert_eq!(disabled.enable(), original);
}

#[test]
fn test_display_value_prefers_alias() {
    let filter = build_phrase_filter(&field("status"), 500, &index())
        .unwrap()
        .with_alias("errors");
    assert_eq!(filter.display_value(), "500");
    assert_eq!(get_display_value_from_filter(&filter), "errors");
}

#[test]
fn test_filter_serde_shape() {
    let filter: Filter = serde_json::from_value(json!({
        "meta": { "type": "phrase", "key": "status", "negate": true },
        "query": { "match_phrase": { "status": 404 } }
    }))
    .unwrap();

    assert!(filter.meta.negate);
    assert!(!filter.meta.disabled);
    assert_eq!(filter.state, FilterState::App);
    assert_eq!(filter.phrase_value(), Some(&json!(404)));

    let back = serde_json::to_value(&filter).unwrap();
    assert_eq!(back["meta"]["type"], "phrase");
    assert_eq!(back["state"], "app");
}
