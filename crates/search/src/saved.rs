//! Saved search sources
//!
//! The persisted form of a [`SearchSource`](crate::SearchSource) keeps the
//! index pattern by id along with the queries and filters:
//!
//! ```json
//! {"index": "logs", "query": [{"language": "kuery", "query": "status:500"}], "filter": []}
//! ```
//!
//! Older documents store a single query, or a bare `query_string` fragment;
//! both are read as lucene queries. Filters are normalized on load.

use serde::{Deserialize, Deserializer, Serialize};

use quarry_query::filter::map_filter;
use quarry_query::{Filter, Query};

use crate::error::{Result, SearchError};

/// Persisted fields of a search source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSearchSource {
    /// Index pattern id
    pub index: String,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "saved_queries"
    )]
    pub query: Vec<Query>,
    #[serde(default, rename = "filter", skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
}

impl SavedSearchSource {
    /// Read a saved search source from JSON
    pub fn parse(json: &str) -> Result<Self> {
        let mut saved: Self =
            serde_json::from_str(json).map_err(|e| SearchError::SavedSource(e.to_string()))?;
        if saved.index.is_empty() {
            return Err(SearchError::SavedSource("index id is empty".to_string()));
        }
        saved.filters = saved.filters.into_iter().map(map_filter).collect();
        Ok(saved)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SearchError::SavedSource(e.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SavedQuery {
    Query(Query),
    QueryString { query_string: QueryStringText },
}

#[derive(Deserialize)]
struct QueryStringText {
    query: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(SavedQuery),
    Many(Vec<SavedQuery>),
}

impl From<SavedQuery> for Query {
    fn from(saved: SavedQuery) -> Self {
        match saved {
            SavedQuery::Query(query) => query,
            SavedQuery::QueryString { query_string } => Query::lucene(query_string.query),
        }
    }
}

fn saved_queries<'de, D>(deserializer: D) -> std::result::Result<Vec<Query>, D::Error>
where
    D: Deserializer<'de>,
{
    let queries = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(query) => vec![query.into()],
        OneOrMany::Many(queries) => queries.into_iter().map(Query::from).collect(),
    };
    Ok(queries)
}
