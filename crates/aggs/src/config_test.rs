//! Tests for aggregation config validation, request generation and labels

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use quarry_query::{AbsoluteTimeRange, Field, FieldKind, IndexPattern, OpenSearchQueryConfig};

use crate::config::{AggConfig, AggConfigs, DslContext};
use crate::error::AggError;
use crate::types::{BucketType, MetricType};

fn logs() -> IndexPattern {
    IndexPattern::new("logs", "logs-*")
        .with_time_field("@timestamp")
        .with_field(Field::new("@timestamp", FieldKind::Date))
        .with_field(Field::new("bytes", FieldKind::Number))
        .with_field(Field::new("status", FieldKind::Number))
        .with_field(Field::new("machine.os", FieldKind::String))
        .with_field(Field::new("clientip", FieldKind::Ip))
        .with_field(Field::new("message", FieldKind::String).not_aggregatable())
}

fn one_day() -> AbsoluteTimeRange {
    let min = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    AbsoluteTimeRange::new(min, min + Duration::hours(24)).unwrap()
}

fn terms(field: &str) -> AggConfig {
    AggConfig::bucket(BucketType::Terms).with_field(field)
}

fn metric(metric: MetricType) -> AggConfig {
    AggConfig::metric(metric)
}

// =============================================================================
// add
// =============================================================================

#[test]
fn test_add_assigns_ids_and_defaults() {
    let index = logs();
    let mut aggs = AggConfigs::new();
    aggs.add(metric(MetricType::Count), Some(&index)).unwrap();
    let added = aggs.add(terms("machine.os"), Some(&index)).unwrap();

    assert_eq!(added.id, "2");
    assert_eq!(added.params["size"], json!(5));
    assert_eq!(added.params["order"], json!("desc"));
    assert_eq!(added.params["order_by"], json!("_count"));
    assert_eq!(aggs.len(), 2);
}

#[test]
fn test_add_skips_taken_ids() {
    let mut aggs = AggConfigs::new();
    aggs.add(metric(MetricType::Count).with_id("2"), None).unwrap();
    assert_eq!(aggs.add(metric(MetricType::Count), None).unwrap().id, "1");
    assert_eq!(aggs.add(metric(MetricType::Count), None).unwrap().id, "3");
}

#[test]
fn test_add_rejects_duplicate_id() {
    let mut aggs = AggConfigs::new();
    aggs.add(metric(MetricType::Count).with_id("a"), None).unwrap();
    assert_eq!(
        aggs.add(metric(MetricType::Count).with_id("a"), None).unwrap_err(),
        AggError::DuplicateAggId("a".to_string())
    );
}

#[test]
fn test_add_checks_fields() {
    let index = logs();
    let mut aggs = AggConfigs::new();

    assert!(matches!(
        aggs.add(terms("nope").with_id("t"), Some(&index)),
        Err(AggError::UnknownField { .. })
    ));
    assert!(matches!(
        aggs.add(metric(MetricType::Sum).with_field("machine.os"), Some(&index)),
        Err(AggError::FieldKindMismatch { kind: FieldKind::String, .. })
    ));
    assert!(matches!(
        aggs.add(terms("message"), Some(&index)),
        Err(AggError::InvalidParam { .. })
    ));
    assert!(matches!(
        aggs.add(metric(MetricType::Avg), Some(&index)),
        Err(AggError::MissingParam { .. })
    ));
    assert!(matches!(
        aggs.add(metric(MetricType::Count).with_field("bytes"), Some(&index)),
        Err(AggError::InvalidParam { .. })
    ));
    assert!(aggs.is_empty());
}

#[test]
fn test_add_checks_params() {
    let mut aggs = AggConfigs::new();

    let unknown = aggs.add(terms("machine.os").with_param("colour", "red"), None);
    assert!(matches!(unknown, Err(AggError::InvalidParam { param, .. }) if param == "colour"));

    let wrong_kind = aggs.add(terms("machine.os").with_param("size", "ten"), None);
    assert!(matches!(wrong_kind, Err(AggError::InvalidParam { param, .. }) if param == "size"));

    let missing = aggs.add(AggConfig::bucket(BucketType::Histogram).with_field("bytes"), None);
    assert!(matches!(missing, Err(AggError::MissingParam { param, .. }) if param == "interval"));

    let bad_interval = aggs.add(
        AggConfig::bucket(BucketType::DateHistogram)
            .with_field("@timestamp")
            .with_param("interval", "2M"),
        None,
    );
    assert!(matches!(bad_interval, Err(AggError::InvalidCalendarInterval(_))));

    let bad_percents = aggs.add(
        metric(MetricType::Percentiles)
            .with_field("bytes")
            .with_param("percents", json!([50, 101])),
        None,
    );
    assert!(matches!(bad_percents, Err(AggError::InvalidParam { .. })));
}

#[test]
fn test_pipeline_reference_must_exist_first() {
    let mut aggs = AggConfigs::new();
    aggs.add(
        AggConfig::bucket(BucketType::DateHistogram)
            .with_id("h")
            .with_field("@timestamp"),
        None,
    )
    .unwrap();

    let dangling = aggs.add(
        metric(MetricType::Derivative)
            .with_id("d")
            .with_param("metric_agg", "s"),
        None,
    );
    assert_eq!(
        dangling.unwrap_err(),
        AggError::DanglingAggReference {
            agg_id: "d".to_string(),
            target: "s".to_string(),
        }
    );

    aggs.add(metric(MetricType::Sum).with_id("s").with_field("bytes"), None)
        .unwrap();
    aggs.add(
        metric(MetricType::Derivative)
            .with_id("d")
            .with_param("metric_agg", "s"),
        None,
    )
    .unwrap();
    aggs.add(
        metric(MetricType::CumulativeSum).with_param("metric_agg", "_count"),
        None,
    )
    .unwrap();
}

#[test]
fn test_sibling_reference_must_be_bucket() {
    let mut aggs = AggConfigs::new();
    aggs.add(metric(MetricType::Count).with_id("c"), None).unwrap();

    let not_bucket = aggs.add(metric(MetricType::MaxBucket).with_param("bucket_agg", "c"), None);
    assert!(matches!(not_bucket, Err(AggError::InvalidParam { .. })));

    let dangling = aggs.add(metric(MetricType::MaxBucket).with_param("bucket_agg", "t"), None);
    assert!(matches!(dangling, Err(AggError::DanglingAggReference { .. })));
}

#[test]
fn test_terms_order_by_metric() {
    let mut aggs = AggConfigs::new();
    let missing = aggs.add(terms("machine.os").with_param("order_by", "1"), None);
    assert!(matches!(missing, Err(AggError::DanglingAggReference { .. })));

    aggs.add(
        metric(MetricType::Percentiles).with_id("p").with_field("bytes"),
        None,
    )
    .unwrap();
    let multi_value = aggs.add(terms("machine.os").with_param("order_by", "p"), None);
    assert!(matches!(multi_value, Err(AggError::InvalidParam { .. })));
}

#[test]
fn test_terms_order_by_rejects_parent_pipeline() {
    let mut aggs = AggConfigs::new();
    aggs.add(
        AggConfig::bucket(BucketType::DateHistogram)
            .with_id("h")
            .with_field("@timestamp"),
        None,
    )
    .unwrap();
    aggs.add(metric(MetricType::Sum).with_id("s").with_field("bytes"), None)
        .unwrap();
    aggs.add(
        metric(MetricType::CumulativeSum)
            .with_id("cs")
            .with_param("metric_agg", "s"),
        None,
    )
    .unwrap();

    let err = aggs
        .add(terms("machine.os").with_param("order_by", "cs"), None)
        .unwrap_err();
    assert!(
        matches!(&err, AggError::InvalidParam { param, .. } if param == "order_by"),
        "{:?}",
        err
    );

    // A plain metric is still a valid sort key
    aggs.add(terms("machine.os").with_param("order_by", "s"), None)
        .unwrap();
}

#[test]
fn test_deserialize_config() {
    let config: AggConfig = serde_json::from_value(json!({
        "type": "date_histogram",
        "field": "@timestamp",
        "params": {"interval": "1h"}
    }))
    .unwrap();
    assert_eq!(config.bucket_type(), Some(BucketType::DateHistogram));
    assert!(config.enabled);
    assert!(config.id.is_empty());
}

// =============================================================================
// to_dsl
// =============================================================================

#[test]
fn test_dsl_nests_buckets_outermost_first() {
    let index = logs();
    let aggs = AggConfigs::from_configs(
        [
            metric(MetricType::Avg).with_id("avg").with_field("bytes"),
            terms("machine.os").with_id("os"),
            AggConfig::bucket(BucketType::DateHistogram)
                .with_id("time")
                .with_field("@timestamp"),
            metric(MetricType::Count).with_id("count"),
        ],
        Some(&index),
    )
    .unwrap();

    let ctx = DslContext::default().with_time_range(one_day());
    let dsl = aggs.to_dsl(&ctx).unwrap();

    assert_eq!(
        dsl,
        json!({
            "os": {
                "terms": {"field": "machine.os", "size": 5, "order": {"_count": "desc"}},
                "aggs": {
                    "time": {
                        "date_histogram": {
                            "field": "@timestamp",
                            "fixed_interval": "15m",
                            "min_doc_count": 1
                        },
                        "aggs": {
                            "avg": {"avg": {"field": "bytes"}}
                        }
                    }
                }
            }
        })
    );
}

#[test]
fn test_dsl_metrics_at_all_levels() {
    let aggs = AggConfigs::from_configs(
        [
            terms("machine.os").with_id("os"),
            AggConfig::bucket(BucketType::Histogram)
                .with_id("b")
                .with_field("bytes")
                .with_param("interval", 1000),
            metric(MetricType::Max).with_id("m").with_field("bytes"),
        ],
        None,
    )
    .unwrap();

    let ctx = DslContext::default().with_metrics_at_all_levels(true);
    let dsl = aggs.to_dsl(&ctx).unwrap();
    assert_eq!(dsl["os"]["aggs"]["m"], json!({"max": {"field": "bytes"}}));
    assert_eq!(dsl["os"]["aggs"]["b"]["aggs"]["m"], json!({"max": {"field": "bytes"}}));

    let dsl = aggs.to_dsl(&DslContext::default()).unwrap();
    assert!(dsl["os"]["aggs"].get("m").is_none());
}

#[test]
fn test_dsl_auto_interval_needs_time_range() {
    let aggs = AggConfigs::from_configs(
        [AggConfig::bucket(BucketType::DateHistogram).with_field("@timestamp")],
        None,
    )
    .unwrap();
    assert!(matches!(
        aggs.to_dsl(&DslContext::default()),
        Err(AggError::InvalidParam { param, .. }) if param == "interval"
    ));
}

#[test]
fn test_dsl_calendar_interval_and_time_zone() {
    let aggs = AggConfigs::from_configs(
        [AggConfig::bucket(BucketType::DateHistogram)
            .with_field("@timestamp")
            .with_param("interval", "1M")
            .with_param("min_doc_count", 0)],
        None,
    )
    .unwrap();

    let query_config = OpenSearchQueryConfig {
        date_format_tz: Some("Europe/Berlin".to_string()),
        ..OpenSearchQueryConfig::default()
    };
    let ctx = DslContext::default()
        .with_time_range(one_day())
        .with_query_config(query_config);
    let dsl = aggs.to_dsl(&ctx).unwrap();
    let histogram = &dsl["1"]["date_histogram"];

    assert_eq!(histogram["calendar_interval"], "1M");
    assert_eq!(histogram["time_zone"], "Europe/Berlin");
    assert_eq!(
        histogram["extended_bounds"]["min"],
        json!(one_day().min.timestamp_millis())
    );
}

#[test]
fn test_dsl_explicit_interval_is_scaled() {
    let aggs = AggConfigs::from_configs(
        [AggConfig::bucket(BucketType::DateHistogram)
            .with_field("@timestamp")
            .with_param("interval", "1s")],
        None,
    )
    .unwrap();
    let dsl = aggs
        .to_dsl(&DslContext::default().with_time_range(one_day()))
        .unwrap();
    assert_eq!(dsl["1"]["date_histogram"]["fixed_interval"], "5m");
}

#[test]
fn test_dsl_terms_ordered_by_metric_outside_innermost() {
    let aggs = AggConfigs::from_configs(
        [
            metric(MetricType::Median).with_id("med").with_field("bytes"),
            terms("machine.os").with_id("os").with_param("order_by", "med"),
            AggConfig::bucket(BucketType::Histogram)
                .with_id("b")
                .with_field("bytes")
                .with_param("interval", 100),
        ],
        None,
    )
    .unwrap();
    let dsl = aggs.to_dsl(&DslContext::default()).unwrap();

    assert_eq!(dsl["os"]["terms"]["order"], json!({"med.50": "desc"}));
    assert_eq!(
        dsl["os"]["aggs"]["med"],
        json!({"percentiles": {"field": "bytes", "percents": [50]}})
    );
}

#[test]
fn test_dsl_parent_pipelines() {
    let aggs = AggConfigs::from_configs(
        [
            AggConfig::bucket(BucketType::DateHistogram)
                .with_id("h")
                .with_field("@timestamp")
                .with_param("interval", "1h"),
            metric(MetricType::Sum).with_id("s").with_field("bytes"),
            metric(MetricType::Derivative)
                .with_id("d")
                .with_param("metric_agg", "s"),
            metric(MetricType::MovingAvg)
                .with_id("ma")
                .with_param("metric_agg", "_count"),
        ],
        None,
    )
    .unwrap();
    let dsl = aggs.to_dsl(&DslContext::default()).unwrap();
    let inner = &dsl["h"]["aggs"];

    assert_eq!(inner["d"], json!({"derivative": {"buckets_path": "s"}}));
    assert_eq!(
        inner["ma"],
        json!({
            "moving_fn": {
                "buckets_path": "_count",
                "window": 5,
                "script": "MovingFunctions.unweightedAvg(values)"
            }
        })
    );
}

#[test]
fn test_dsl_parent_pipeline_needs_histogram() {
    let aggs = AggConfigs::from_configs(
        [
            terms("machine.os"),
            metric(MetricType::CumulativeSum).with_param("metric_agg", "_count"),
        ],
        None,
    )
    .unwrap();
    assert!(matches!(
        aggs.to_dsl(&DslContext::default()),
        Err(AggError::InvalidParam { .. })
    ));
}

#[test]
fn test_dsl_sibling_pipeline_beside_bucket() {
    let aggs = AggConfigs::from_configs(
        [
            terms("machine.os").with_id("os"),
            metric(MetricType::Avg).with_id("a").with_field("bytes"),
            metric(MetricType::MaxBucket)
                .with_id("top")
                .with_param("bucket_agg", "os")
                .with_param("metric_agg", "a"),
        ],
        None,
    )
    .unwrap();
    let dsl = aggs.to_dsl(&DslContext::default()).unwrap();

    assert_eq!(dsl["top"], json!({"max_bucket": {"buckets_path": "os>a"}}));
    assert!(dsl["os"]["aggs"].get("top").is_none());
}

#[test]
fn test_dsl_ip_range_masks() {
    let index = logs();
    let aggs = AggConfigs::from_configs(
        [AggConfig::bucket(BucketType::IpRange)
            .with_field("clientip")
            .with_param(
                "ranges",
                json!([{"mask": "10.0.0.0/8"}, {"from": "192.168.0.1", "to": "192.168.0.9"}]),
            )],
        Some(&index),
    )
    .unwrap();
    let dsl = aggs.to_dsl(&DslContext::default()).unwrap();

    assert_eq!(
        dsl["1"]["ip_range"]["ranges"],
        json!([
            {"key": "10.0.0.0/8", "from": "10.0.0.0", "to": "11.0.0.0"},
            {"from": "192.168.0.1", "to": "192.168.0.9"}
        ])
    );

    let bad = AggConfigs::from_configs(
        [AggConfig::bucket(BucketType::IpRange)
            .with_field("clientip")
            .with_param("ranges", json!([{"mask": "10.0.0.0/40"}]))],
        Some(&index),
    );
    assert!(matches!(bad, Err(AggError::InvalidCidr(_))));
}

#[test]
fn test_dsl_filters_lowered_through_query_builder() {
    let index = logs();
    let aggs = AggConfigs::from_configs(
        [AggConfig::bucket(BucketType::Filters).with_param(
            "filters",
            json!([
                {"input": {"language": "kuery", "query": "status:500"}, "label": "errors"},
                {"input": {"language": "lucene", "query": ""}}
            ]),
        )],
        Some(&index),
    )
    .unwrap();
    let dsl = aggs
        .to_dsl(&DslContext::default().with_index(&index))
        .unwrap();
    let filters = &dsl["1"]["filters"]["filters"];

    assert_eq!(filters["errors"]["bool"]["must"], json!([{"match": {"status": 500}}]));
    assert_eq!(filters["*"]["bool"]["must"], json!([{"match_all": {}}]));
}

#[test]
fn test_dsl_filters_syntax_error_surfaces() {
    let aggs = AggConfigs::from_configs(
        [AggConfig::bucket(BucketType::Filters).with_param(
            "filters",
            json!([{"input": {"language": "kuery", "query": "status:"}}]),
        )],
        None,
    )
    .unwrap();
    assert!(matches!(
        aggs.to_dsl(&DslContext::default()),
        Err(AggError::Query(_))
    ));
}

#[test]
fn test_disabled_configs_are_skipped() {
    let aggs = AggConfigs::from_configs(
        [
            terms("machine.os").with_id("os").disabled(),
            metric(MetricType::Sum).with_id("s").with_field("bytes"),
        ],
        None,
    )
    .unwrap();
    let dsl = aggs.to_dsl(&DslContext::default()).unwrap();
    assert_eq!(dsl, json!({"s": {"sum": {"field": "bytes"}}}));
}

// =============================================================================
// Labels
// =============================================================================

#[test]
fn test_labels() {
    let aggs = AggConfigs::from_configs(
        [
            metric(MetricType::Count).with_id("c"),
            metric(MetricType::Sum).with_id("s").with_field("bytes"),
            metric(MetricType::Avg).with_id("a").with_field("bytes"),
            metric(MetricType::Cardinality).with_id("u").with_field("clientip"),
            AggConfig::bucket(BucketType::DateHistogram)
                .with_id("h")
                .with_field("@timestamp")
                .with_param("interval", "15m"),
            terms("machine.os").with_id("t"),
            metric(MetricType::Derivative)
                .with_id("d")
                .with_param("metric_agg", "s"),
            metric(MetricType::Max)
                .with_id("x")
                .with_field("bytes")
                .with_param("custom_label", "Peak"),
        ],
        None,
    )
    .unwrap();

    let label = |id: &str| aggs.label_of(id).unwrap();
    assert_eq!(label("c"), "Count");
    assert_eq!(label("s"), "Sum of bytes");
    assert_eq!(label("a"), "Average bytes");
    assert_eq!(label("u"), "Unique count of clientip");
    assert_eq!(label("h"), "@timestamp per 15 minutes");
    assert_eq!(label("t"), "Top 5 machine.os");
    assert_eq!(label("d"), "Derivative of Sum of bytes");
    assert_eq!(label("x"), "Peak");
}
