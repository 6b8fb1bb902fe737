//! Quarry Query
//!
//! Turns what the user typed and clicked into a structured backend query.
//!
//! # Overview
//!
//! - **Filters**: the filter model, builders, comparator and click-to-filter
//!   generation
//! - **KQL**: parser to a syntax tree and lowering to the query DSL
//! - **Builder**: combines queries and filters into one bool query
//! - **Time ranges**: date math resolution (`now-7d/d`)
//!
//! # Usage
//!
//! ```
//! use quarry_query::{
//!     Field, FieldKind, IndexPattern, OpenSearchQueryConfig, Query, build_opensearch_query,
//!     build_phrase_filter,
//! };
//!
//! let index = IndexPattern::new("logs", "logs-*")
//!     .with_field(Field::new("status", FieldKind::Number))
//!     .with_field(Field::new("service", FieldKind::String));
//!
//! let filter = build_phrase_filter(index.field("service").unwrap(), "checkout", &index).unwrap();
//! let query = build_opensearch_query(
//!     Some(&index),
//!     &[Query::kuery("status >= 500")],
//!     &[filter],
//!     &OpenSearchQueryConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(query.must.len(), 2);
//! ```

pub mod builder;
pub mod error;
pub mod field;
pub mod filter;
pub mod kuery;
pub mod language;
pub mod lucene;
pub mod timerange;

#[cfg(test)]
mod builder_test;
#[cfg(test)]
mod timerange_test;

pub use builder::{
    BoolQuery, OpenSearchQueryConfig, build_opensearch_query, build_query_from_filters,
    decorate_query, get_opensearch_query_config,
};
pub use error::{QueryError, Result};
pub use field::{Field, FieldKind, IndexPattern};
pub use filter::{
    CompareOptions, Filter, FilterMeta, FilterOperation, FilterState, FilterType, RangeParams,
    build_custom_filter, build_empty_filter, build_exists_filter, build_phrase_filter,
    build_phrases_filter, build_query_filter, build_range_filter, compare_filters,
    generate_filters, map_and_flatten_filters, only_disabled_filters_changed, uniq_filters,
};
pub use kuery::{KueryNode, parse as parse_kuery, to_structured_query};
pub use language::{Language, Query};
pub use lucene::lucene_string_to_dsl;
pub use timerange::{AbsoluteTimeRange, TimeRange, to_absolute_dates};
