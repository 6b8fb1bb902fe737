//! Tests for the structured query builder

use serde_json::{Map, Value, json};

use crate::builder::{
    BoolQuery, OpenSearchQueryConfig, build_opensearch_query, build_query_from_filters,
    decorate_query, get_opensearch_query_config,
};
use crate::error::QueryError;
use crate::field::{Field, FieldKind, IndexPattern};
use crate::filter::{Filter, build_exists_filter, build_phrase_filter};
use crate::language::{Language, Query};

fn logs() -> IndexPattern {
    IndexPattern::new("logs", "logs-*")
        .with_time_field("@timestamp")
        .with_field(Field::new("@timestamp", FieldKind::Date))
        .with_field(Field::new("status", FieldKind::Number))
        .with_field(Field::new("service", FieldKind::String))
        .with_field(Field::new("host", FieldKind::String))
}

fn phrase(field: &str, value: Value) -> Filter {
    let index = logs();
    build_phrase_filter(index.field(field).unwrap(), value, &index).unwrap()
}

fn build(queries: &[Query], filters: &[Filter]) -> BoolQuery {
    build_opensearch_query(
        Some(&logs()),
        queries,
        filters,
        &OpenSearchQueryConfig::default(),
    )
    .unwrap()
}

#[test]
fn test_single_term_round_trip() {
    let query = build(&[Query::kuery("status:500")], &[]);

    assert_eq!(query.must, vec![json!({ "match": { "status": 500 } })]);
    assert!(query.filter.is_empty());
    assert!(query.should.is_empty());
    assert!(query.must_not.is_empty());
}

#[test]
fn test_query_and_filter_scenario() {
    let query = build(
        &[Query::kuery(r#"status:500 and service:"checkout""#)],
        &[phrase("host", json!("web-1"))],
    );

    assert_eq!(query.must.len(), 3);
    assert!(query.must_not.is_empty());
    assert_eq!(
        query.to_json(),
        json!({
            "bool": {
                "must": [
                    { "match": { "status": 500 } },
                    { "match_phrase": { "service": "checkout" } },
                    { "match_phrase": { "host": "web-1" } }
                ],
                "filter": [],
                "should": [],
                "must_not": []
            }
        })
    );
}

#[test]
fn test_empty_query_contributes_nothing() {
    let query = build(&[Query::kuery("")], &[]);
    assert!(query.is_empty());
}

#[test]
fn test_disabled_and_negated_filters() {
    let filters = vec![
        phrase("status", json!(500)),
        phrase("service", json!("cart")).toggle_negated(),
        phrase("host", json!("web-1")).disable(),
    ];
    let query = build(&[], &filters);

    assert_eq!(query.must, vec![json!({ "match_phrase": { "status": 500 } })]);
    assert_eq!(
        query.must_not,
        vec![json!({ "match_phrase": { "service": "cart" } })]
    );
}

#[test]
fn test_duplicate_filters_emitted_once() {
    let filters = vec![
        phrase("status", json!(500)),
        phrase("status", json!(500)).pin(),
    ];
    let query = build(&[Query::kuery("status:500")], &filters);

    // Query clause and filter clause differ; the duplicate filter is dropped
    assert_eq!(query.must.len(), 2);
}

#[test]
fn test_identical_clauses_emitted_once() {
    let query = build(
        &[Query::kuery("service:cart"), Query::kuery("service:cart")],
        &[],
    );
    assert_eq!(query.must.len(), 1);
}

#[test]
fn test_ignore_filter_if_field_not_in_index() {
    let other = IndexPattern::new("other", "other-*").with_field(Field::new("region", FieldKind::String));
    let foreign = build_exists_filter(other.field("region").unwrap(), &other).unwrap();
    let custom = Filter {
        query: json!({ "term": { "region": "eu" } }),
        ..build_exists_filter(other.field("region").unwrap(), &other).unwrap()
    };
    let custom = crate::filter::map_filter(custom);

    let lenient = OpenSearchQueryConfig::default();
    let strict = OpenSearchQueryConfig {
        ignore_filter_if_field_not_in_index: true,
        ..Default::default()
    };

    let kept = build_opensearch_query(Some(&logs()), &[], &[foreign.clone()], &lenient).unwrap();
    assert_eq!(kept.must.len(), 1);

    let dropped = build_opensearch_query(Some(&logs()), &[], &[foreign], &strict).unwrap();
    assert!(dropped.is_empty());

    // Custom filters carry no key and always apply
    let applied = build_opensearch_query(Some(&logs()), &[], &[custom], &strict).unwrap();
    assert_eq!(applied.must.len(), 1);
}

#[test]
fn test_lucene_query_is_decorated() {
    let config = OpenSearchQueryConfig {
        date_format_tz: Some("UTC".to_string()),
        ..Default::default()
    };
    let query = build_opensearch_query(
        Some(&logs()),
        &[Query::lucene("status:5*")],
        &[],
        &config,
    )
    .unwrap();

    assert_eq!(
        query.must,
        vec![json!({
            "query_string": {
                "query": "status:5*",
                "analyze_wildcard": true,
                "time_zone": "UTC"
            }
        })]
    );
}

#[test]
fn test_unsupported_languages() {
    for language in [Language::Sql, Language::Ppl] {
        let err = build_opensearch_query(
            Some(&logs()),
            &[Query::new(language, "source = logs")],
            &[],
            &OpenSearchQueryConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, QueryError::UnsupportedLanguage(language.to_string()));
    }
}

#[test]
fn test_syntax_error_surfaces() {
    let err = build_opensearch_query(
        Some(&logs()),
        &[Query::kuery("status:(500")],
        &[],
        &OpenSearchQueryConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::QuerySyntax { position: 11, .. }));
}

#[test]
fn test_legacy_filter_migrated() {
    let mut legacy = phrase("service", json!("cart"));
    legacy.query = json!({ "match": { "service": { "query": "cart", "type": "phrase" } } });

    let query = build_query_from_filters(&[legacy], None, &OpenSearchQueryConfig::default());
    assert_eq!(query.must, vec![json!({ "match_phrase": { "service": "cart" } })]);
}

#[test]
fn test_legacy_missing_filter_lowers_to_negated_exists() {
    let mut missing = phrase("host", json!("web-1"));
    missing.query = json!({ "missing": { "field": "host" } });
    let negated = missing.toggle_negated();

    let query = build_query_from_filters(&[missing], None, &OpenSearchQueryConfig::default());
    assert!(query.must.is_empty());
    assert_eq!(query.must_not, vec![json!({ "exists": { "field": "host" } })]);

    let query = build_query_from_filters(&[negated], None, &OpenSearchQueryConfig::default());
    assert_eq!(query.must, vec![json!({ "exists": { "field": "host" } })]);
    assert!(query.must_not.is_empty());
}

#[test]
fn test_decorate_query() {
    let mut options = Map::new();
    options.insert("analyze_wildcard".to_string(), json!(true));
    options.insert("default_operator".to_string(), json!("AND"));

    let decorated = decorate_query(
        json!({ "query_string": { "query": "a b", "default_operator": "OR" } }),
        &options,
        Some("Europe/Berlin"),
    );
    assert_eq!(
        decorated,
        json!({
            "query_string": {
                "query": "a b",
                "default_operator": "OR",
                "analyze_wildcard": true,
                "time_zone": "Europe/Berlin"
            }
        })
    );

    // Other clauses are untouched
    let term = json!({ "term": { "status": 500 } });
    assert_eq!(decorate_query(term.clone(), &options, Some("UTC")), term);
}

#[test]
fn test_config_from_query_config() {
    let mut source = quarry_config::QueryConfig::default();
    source.strict_field_resolution = true;
    source.date_format_tz = Some("Asia/Tokyo".to_string());

    let config = get_opensearch_query_config(&source);
    assert!(config.strict_field_resolution);
    assert_eq!(config.date_format_tz.as_deref(), Some("Asia/Tokyo"));
    assert_eq!(OpenSearchQueryConfig::from(&source), config);
}
