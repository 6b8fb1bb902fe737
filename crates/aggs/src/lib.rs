//! Quarry Aggs
//!
//! Typed aggregation definitions, interval resolution and response
//! flattening.
//!
//! One ordered [`AggConfigs`] drives both sides of a search: it generates the
//! aggregation request and later interprets the response.
//!
//! # Usage
//!
//! ```
//! use quarry_aggs::{AggConfig, AggConfigs, BucketType, DslContext, MetricType, TabifyOptions, tabify_agg_response};
//! use serde_json::json;
//!
//! let aggs = AggConfigs::from_configs(
//!     [
//!         AggConfig::bucket(BucketType::Terms).with_field("machine.os"),
//!         AggConfig::metric(MetricType::Count),
//!     ],
//!     None,
//! )
//! .unwrap();
//!
//! let dsl = aggs.to_dsl(&DslContext::default()).unwrap();
//! assert_eq!(dsl["1"]["terms"]["field"], "machine.os");
//!
//! let response = json!({"aggregations": {"1": {"buckets": [
//!     {"key": "linux", "doc_count": 12},
//!     {"key": "osx", "doc_count": 3},
//! ]}}});
//! let table = tabify_agg_response(&aggs, &response, TabifyOptions::default()).unwrap();
//! assert_eq!(table.row_count(), 2);
//! ```

pub mod cidr;
pub mod config;
pub mod error;
pub mod interval;
pub mod tabify;
pub mod types;

#[cfg(test)]
mod config_test;

pub use cidr::CidrMask;
pub use config::{AggConfig, AggConfigs, COUNT_REF, DslContext, KEY_REF};
pub use error::{AggError, Result};
pub use interval::{
    AUTO, INTERVAL_LADDER, IntervalKind, IntervalOption, IntervalUnit, OpenSearchInterval,
    ParsedInterval, ResolvedInterval, date_histogram_interval, interval_options,
    is_valid_interval, is_valid_opensearch_interval, parse_interval, parse_opensearch_interval,
    resolve_interval,
};
pub use tabify::{
    TabbedAggColumn, TabbedAggRow, TabbedTable, TabifyOptions, tabify_agg_response,
    tabify_get_columns,
};
pub use types::{AggType, BucketType, MetricType, ParamKind, ParamSpec, Schema, agg_types_for_field};
