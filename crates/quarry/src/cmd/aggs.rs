//! Aggs command - build the aggregation request for a list of agg configs
//!
//! # Usage
//!
//! ```bash
//! quarry aggs aggs.json --index logs.json --from now-24h
//! quarry aggs aggs.json --columns
//! ```
//!
//! The aggs file is a JSON array of agg configs:
//!
//! ```json
//! [
//!   {"id": "1", "type": "date_histogram", "field": "@timestamp", "params": {"interval": "auto"}},
//!   {"id": "2", "type": "avg", "field": "bytes"}
//! ]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use serde_json::{Value, json};

use quarry_aggs::{AggConfigs, DslContext, tabify_get_columns};
use quarry_config::Config;
use quarry_query::{IndexPattern, OpenSearchQueryConfig};

use super::input::{load_aggs, load_index, time_range};
use super::output::print_json;

/// Aggs command arguments
#[derive(Args, Debug)]
pub struct AggsArgs {
    /// JSON array of agg configs
    #[arg(value_name = "AGGS")]
    aggs: PathBuf,

    /// Index pattern JSON file used to validate fields
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// Start of the time range (e.g. now-24h)
    #[arg(long)]
    from: Option<String>,

    /// End of the time range
    #[arg(long, default_value = "now")]
    to: String,

    /// Print the table columns the response will flatten into
    #[arg(long)]
    columns: bool,
}

/// Run the aggs command
pub fn run(args: AggsArgs, config: &Config) -> Result<()> {
    let index = load_index(args.index.as_deref())?;
    let aggs = load_aggs(&args.aggs, index.as_ref())?;

    if args.columns {
        let columns = tabify_get_columns(&aggs, !config.aggs.metrics_at_all_levels);
        return print_json(&columns);
    }

    let dsl = build_dsl(&aggs, index.as_ref(), args.from.as_deref(), &args.to, config)?;
    print_json(&dsl)
}

/// The `aggs` body for a search request
pub fn build_dsl(
    aggs: &AggConfigs,
    index: Option<&IndexPattern>,
    from: Option<&str>,
    to: &str,
    config: &Config,
) -> Result<Value> {
    let mut ctx = DslContext::new(&config.aggs)
        .with_query_config(OpenSearchQueryConfig::from(&config.query));
    if let Some(index) = index {
        ctx = ctx.with_index(index);
    }
    if let Some(range) = time_range(from, to) {
        let range = range
            .to_absolute(Utc::now())
            .context("invalid time range")?;
        ctx = ctx.with_time_range(range);
    }

    let dsl = aggs.to_dsl(&ctx).context("failed to build aggregation request")?;
    Ok(json!({ "aggs": dsl }))
}
