//! Structured query builder
//!
//! Combines user queries (KQL or lucene) and filters into one
//! `{"bool": {must, filter, should, must_not}}` query:
//! - Each top-level KQL conjunct becomes its own `must` clause
//! - Disabled filters are dropped, negated ones go to `must_not`
//! - Equivalent filters and identical clauses are emitted once

use serde::Serialize;
use serde_json::{Map, Value, json};

use quarry_config::QueryConfig;

use crate::error::{QueryError, Result};
use crate::field::IndexPattern;
use crate::filter::{CompareOptions, Filter, map_filter, uniq_filters};
use crate::kuery::{FunctionName, KueryNode, ParseOptions, parse_with_options, to_structured_query};
use crate::language::{Language, Query};
use crate::lucene::lucene_string_to_dsl;

/// Settings that shape the generated query
#[derive(Debug, Clone, PartialEq)]
pub struct OpenSearchQueryConfig {
    /// Accept KQL values starting with `*`
    pub allow_leading_wildcards: bool,
    /// Merged into every `query_string` clause
    pub query_string_options: Map<String, Value>,
    /// Drop filters on fields the index pattern does not have
    pub ignore_filter_if_field_not_in_index: bool,
    /// Time zone for date ranges and `query_string` clauses
    pub date_format_tz: Option<String>,
    /// Unknown KQL fields are an error instead of a text search
    pub strict_field_resolution: bool,
}

impl Default for OpenSearchQueryConfig {
    fn default() -> Self {
        get_opensearch_query_config(&QueryConfig::default())
    }
}

impl From<&QueryConfig> for OpenSearchQueryConfig {
    fn from(config: &QueryConfig) -> Self {
        get_opensearch_query_config(config)
    }
}

/// Extract the query-building settings from the engine configuration
pub fn get_opensearch_query_config(config: &QueryConfig) -> OpenSearchQueryConfig {
    OpenSearchQueryConfig {
        allow_leading_wildcards: config.allow_leading_wildcards,
        query_string_options: config.query_string_options.clone(),
        ignore_filter_if_field_not_in_index: config.ignore_filter_if_field_not_in_index,
        date_format_tz: config.date_format_tz.clone(),
        strict_field_resolution: config.strict_field_resolution,
    }
}

/// A boolean query under construction
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    pub must: Vec<Value>,
    pub filter: Vec<Value>,
    pub should: Vec<Value>,
    pub must_not: Vec<Value>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `must` clause
    pub fn must(mut self, clause: Value) -> Self {
        push_unique(&mut self.must, clause);
        self
    }

    /// Add a `filter` clause
    pub fn filter(mut self, clause: Value) -> Self {
        push_unique(&mut self.filter, clause);
        self
    }

    /// Add a `should` clause
    pub fn should(mut self, clause: Value) -> Self {
        push_unique(&mut self.should, clause);
        self
    }

    /// Add a `must_not` clause
    pub fn must_not(mut self, clause: Value) -> Self {
        push_unique(&mut self.must_not, clause);
        self
    }

    /// Merge another bool query's clauses after this one's
    pub fn merge(self, other: BoolQuery) -> Self {
        let mut merged = self;
        for clause in other.must {
            merged = merged.must(clause);
        }
        for clause in other.filter {
            merged = merged.filter(clause);
        }
        for clause in other.should {
            merged = merged.should(clause);
        }
        for clause in other.must_not {
            merged = merged.must_not(clause);
        }
        merged
    }

    /// Total clause count
    pub fn len(&self) -> usize {
        self.must.len() + self.filter.len() + self.should.len() + self.must_not.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `{"bool": {...}}`
    pub fn to_json(&self) -> Value {
        json!({ "bool": self })
    }
}

fn push_unique(clauses: &mut Vec<Value>, clause: Value) {
    if !clauses.contains(&clause) {
        clauses.push(clause);
    }
}

// =============================================================================
// Query building
// =============================================================================

/// Build the full structured query for a set of queries and filters
///
/// Parsing and field resolution errors surface here, before anything is
/// sent to the backend.
pub fn build_opensearch_query(
    index: Option<&IndexPattern>,
    queries: &[Query],
    filters: &[Filter],
    config: &OpenSearchQueryConfig,
) -> Result<BoolQuery> {
    let mut query = BoolQuery::new();

    for q in queries {
        query = query.merge(build_query(index, q, config)?);
    }
    query = query.merge(build_query_from_filters(filters, index, config));

    tracing::debug!(
        queries = queries.len(),
        filters = filters.len(),
        must = query.must.len(),
        must_not = query.must_not.len(),
        "built structured query"
    );
    Ok(query)
}

fn build_query(
    index: Option<&IndexPattern>,
    query: &Query,
    config: &OpenSearchQueryConfig,
) -> Result<BoolQuery> {
    match query.language() {
        Language::Kuery => {
            let options = ParseOptions {
                allow_leading_wildcards: config.allow_leading_wildcards,
            };
            let ast = parse_with_options(query.text(), options)?;
            let mut bool_query = BoolQuery::new();
            for node in top_level_conjuncts(&ast) {
                bool_query = bool_query.must(to_structured_query(node, index, config)?);
            }
            Ok(bool_query)
        }
        Language::Lucene => {
            let dsl = lucene_string_to_dsl(query.text());
            let decorated = decorate_query(
                dsl,
                &config.query_string_options,
                config.date_format_tz.as_deref(),
            );
            Ok(BoolQuery::new().must(decorated))
        }
        other => Err(QueryError::UnsupportedLanguage(other.to_string())),
    }
}

/// A top-level `and` contributes each conjunct separately; the empty query
/// contributes nothing
fn top_level_conjuncts(ast: &KueryNode) -> Vec<&KueryNode> {
    match ast {
        KueryNode::Function {
            name: FunctionName::And,
            arguments,
        } => arguments.iter().collect(),
        other => vec![other],
    }
}

/// Lower filters into `must` / `must_not` clauses
///
/// Disabled filters are skipped. Filters are normalized first (legacy
/// fragments migrated) and equivalent ones emitted once.
pub fn build_query_from_filters(
    filters: &[Filter],
    index: Option<&IndexPattern>,
    config: &OpenSearchQueryConfig,
) -> BoolQuery {
    let enabled: Vec<Filter> = filters
        .iter()
        .filter(|f| f.is_enabled())
        .filter(|f| !config.ignore_filter_if_field_not_in_index || filter_matches_index(f, index))
        .cloned()
        .map(map_filter)
        .collect();

    let mut query = BoolQuery::new();
    for filter in uniq_filters(&enabled, CompareOptions::default().ignore_state()) {
        // `missing` is no longer a query; it lowers to a negated `exists`
        let missing = filter.missing_field().map(str::to_string);
        let (fragment, negate) = match missing {
            Some(field) => (json!({ "exists": { "field": field } }), !filter.meta.negate),
            None => (filter.query, filter.meta.negate),
        };
        let clause = decorate_query(
            fragment,
            &config.query_string_options,
            config.date_format_tz.as_deref(),
        );
        query = if negate {
            query.must_not(clause)
        } else {
            query.must(clause)
        };
    }
    query
}

/// Whether a filter applies to `index`
///
/// Filters without a key (custom DSL) and filters without an index pattern
/// to check against always apply.
fn filter_matches_index(filter: &Filter, index: Option<&IndexPattern>) -> bool {
    match (index, filter.meta.key.as_deref()) {
        (Some(index), Some(key)) => index.has_field(key),
        _ => true,
    }
}

/// Merge configured options and time zone into a `query_string` clause
///
/// Options already present on the clause win. Other clauses are returned
/// unchanged.
pub fn decorate_query(
    mut query: Value,
    query_string_options: &Map<String, Value>,
    date_format_tz: Option<&str>,
) -> Value {
    if let Some(Value::Object(qs)) = query.get_mut("query_string") {
        for (key, value) in query_string_options {
            qs.entry(key.clone()).or_insert_with(|| value.clone());
        }
        if let Some(tz) = date_format_tz {
            qs.entry("time_zone").or_insert_with(|| json!(tz));
        }
    }
    query
}
