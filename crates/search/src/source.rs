//! Search source
//!
//! Composes an index pattern, queries, filters, a time range and shared
//! aggregation configs into one request, then flattens the response with the
//! same configs. The index pattern id, queries and filters round-trip
//! through [`SavedSearchSource`].

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

use quarry_aggs::{AggConfigs, DslContext, TabbedTable, TabifyOptions, tabify_agg_response};
use quarry_config::{AggsConfig, SearchConfig};
use quarry_query::{
    AbsoluteTimeRange, Filter, IndexPattern, OpenSearchQueryConfig, Query, TimeRange,
    build_opensearch_query,
};

use crate::coordinator::SearchCoordinator;
use crate::error::{Result, SearchError};
use crate::request::{SearchOptions, SearchRequest};
use crate::saved::SavedSearchSource;

/// Outcome of [`SearchSource::fetch`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub request_id: u64,
    pub raw: Value,
    /// Present when the source has aggregations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TabbedTable>,
}

/// Everything needed to build one search
#[derive(Debug, Clone)]
pub struct SearchSource {
    index: IndexPattern,
    queries: Vec<Query>,
    filters: Vec<Filter>,
    aggs: Option<Arc<AggConfigs>>,
    time_range: Option<TimeRange>,
    size: u64,
    preference: Option<String>,
    query_config: OpenSearchQueryConfig,
    aggs_config: AggsConfig,
}

impl SearchSource {
    pub fn new(index: IndexPattern) -> Self {
        Self {
            index,
            queries: Vec::new(),
            filters: Vec::new(),
            aggs: None,
            time_range: None,
            size: 0,
            preference: None,
            query_config: OpenSearchQueryConfig::default(),
            aggs_config: AggsConfig::default(),
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn with_aggs(mut self, aggs: Arc<AggConfigs>) -> Self {
        self.aggs = Some(aggs);
        self
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    /// Number of hits to return
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sent as the `preference` request parameter
    pub fn with_preference(mut self, preference: impl Into<String>) -> Self {
        self.preference = Some(preference.into());
        self
    }

    /// Apply the configured preference mode for `session_id`
    pub fn with_search_config(mut self, config: &SearchConfig, session_id: &str) -> Self {
        self.preference = config.preference_for(session_id);
        self
    }

    pub fn with_query_config(mut self, config: OpenSearchQueryConfig) -> Self {
        self.query_config = config;
        self
    }

    pub fn with_aggs_config(mut self, config: AggsConfig) -> Self {
        self.aggs_config = config;
        self
    }

    pub fn index(&self) -> &IndexPattern {
        &self.index
    }

    pub fn aggs(&self) -> Option<&Arc<AggConfigs>> {
        self.aggs.as_ref()
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    // =========================================================================
    // Saved form
    // =========================================================================

    /// Persisted fields: index pattern id, queries and filters
    pub fn to_saved(&self) -> SavedSearchSource {
        SavedSearchSource {
            index: self.index.id.clone(),
            query: self.queries.clone(),
            filters: self.filters.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        self.to_saved().to_json()
    }

    /// Restore a saved source against its index pattern
    ///
    /// `index` must be the pattern the source was saved with.
    pub fn from_saved(saved: SavedSearchSource, index: IndexPattern) -> Result<Self> {
        if saved.index != index.id {
            return Err(SearchError::SavedSource(format!(
                "saved for index pattern '{}', not '{}'",
                saved.index, index.id
            )));
        }
        let mut source = Self::new(index).with_filters(saved.filters);
        source.queries = saved.query;
        Ok(source)
    }

    /// Parse and restore in one step
    pub fn from_json(json: &str, index: IndexPattern) -> Result<Self> {
        Self::from_saved(SavedSearchSource::parse(json)?, index)
    }

    /// Build the request body, resolving the time range against `now`
    ///
    /// The time range becomes a `range` clause on the index pattern's time
    /// field in the `filter` context.
    pub fn to_request(&self, now: DateTime<Utc>) -> Result<SearchRequest> {
        let range = self
            .time_range
            .as_ref()
            .map(|r| r.to_absolute(now))
            .transpose()?;

        let mut query = build_opensearch_query(
            Some(&self.index),
            &self.queries,
            &self.filters,
            &self.query_config,
        )?;
        if let (Some(range), Some(time_field)) = (range, &self.index.time_field) {
            query = query.filter(time_filter(time_field, &range));
        }

        let mut body = Map::new();
        body.insert("size".to_string(), json!(self.size));
        body.insert("track_total_hits".to_string(), json!(true));
        body.insert("query".to_string(), query.to_json());

        if let Some(aggs) = self.aggs.as_deref()
            && !aggs.is_empty()
        {
            let mut ctx = DslContext::new(&self.aggs_config)
                .with_index(&self.index)
                .with_query_config(self.query_config.clone());
            if let Some(range) = range {
                ctx = ctx.with_time_range(range);
            }
            body.insert("aggs".to_string(), aggs.to_dsl(&ctx)?);
        }

        let mut request = SearchRequest::new(&self.index.title, Value::Object(body));
        if let Some(preference) = &self.preference {
            request = request.with_preference(preference.as_str());
        }
        Ok(request)
    }

    /// Build, dispatch and flatten
    pub async fn fetch(
        &self,
        coordinator: &SearchCoordinator,
        options: SearchOptions,
        now: DateTime<Utc>,
    ) -> Result<SearchResponse> {
        let request = self.to_request(now)?;
        let pending = coordinator.search(request, options);
        let request_id = pending.id();
        let raw = pending.run().await?;

        let table = match self.aggs.as_deref() {
            Some(aggs) if !aggs.is_empty() => {
                let options = TabifyOptions::default()
                    .with_metrics_at_all_levels(self.aggs_config.metrics_at_all_levels)
                    .with_partial_rows(self.aggs_config.partial_rows);
                Some(tabify_agg_response(aggs, &raw, options)?)
            }
            _ => None,
        };

        Ok(SearchResponse {
            request_id,
            raw,
            table,
        })
    }
}

fn time_filter(field: &str, range: &AbsoluteTimeRange) -> Value {
    json!({
        "range": {
            field: {
                "gte": range.min.to_rfc3339_opts(SecondsFormat::Millis, true),
                "lte": range.max.to_rfc3339_opts(SecondsFormat::Millis, true),
                "format": "strict_date_optional_time",
            }
        }
    })
}
