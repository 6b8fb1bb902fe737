//! Loading command inputs from JSON files

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use quarry_aggs::{AggConfig, AggConfigs};
use quarry_query::{Filter, IndexPattern, TimeRange};

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {} file: {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {} file: {}", what, path.display()))
}

pub fn load_index(path: Option<&Path>) -> Result<Option<IndexPattern>> {
    path.map(|p| read_json(p, "index pattern")).transpose()
}

/// Filters file: a JSON array of filters; missing path means no filters
pub fn load_filters(path: Option<&Path>) -> Result<Vec<Filter>> {
    match path {
        Some(path) => read_json(path, "filters"),
        None => Ok(Vec::new()),
    }
}

/// Aggs file: a JSON array of agg configs, validated against the index pattern
pub fn load_aggs(path: &Path, index: Option<&IndexPattern>) -> Result<AggConfigs> {
    let configs: Vec<AggConfig> = read_json(path, "aggs")?;
    AggConfigs::from_configs(configs, index)
        .with_context(|| format!("invalid agg configs in {}", path.display()))
}

/// `--from`/`--to` pair; no `--from` means no time range
pub fn time_range(from: Option<&str>, to: &str) -> Option<TimeRange> {
    from.map(|from| TimeRange::new(from, to))
}
