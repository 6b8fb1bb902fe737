//! Tabify command - flatten a recorded aggregation response
//!
//! # Usage
//!
//! ```bash
//! quarry tabify aggs.json response.json
//! quarry tabify aggs.json response.json --partial-rows --format csv
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use quarry_aggs::{TabifyOptions, tabify_agg_response};
use quarry_config::Config;

use super::input::{load_aggs, load_index, read_json};
use super::output::{parse_format, print_table};

/// Tabify command arguments
#[derive(Args, Debug)]
pub struct TabifyArgs {
    /// JSON array of agg configs the response was requested with
    #[arg(value_name = "AGGS")]
    aggs: PathBuf,

    /// Recorded search response
    #[arg(value_name = "RESPONSE")]
    response: PathBuf,

    /// Index pattern JSON file used to validate fields
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table")]
    format: String,

    /// Emit metric columns at every bucket level
    #[arg(long)]
    metrics_at_all_levels: bool,

    /// Keep rows with missing metric values
    #[arg(long)]
    partial_rows: bool,
}

/// Run the tabify command
pub fn run(args: TabifyArgs, config: &Config) -> Result<()> {
    let format = parse_format(&args.format)?;
    let index = load_index(args.index.as_deref())?;
    let aggs = load_aggs(&args.aggs, index.as_ref())?;
    let response: Value = read_json(&args.response, "response")?;

    let options = TabifyOptions::default()
        .with_metrics_at_all_levels(args.metrics_at_all_levels || config.aggs.metrics_at_all_levels)
        .with_partial_rows(args.partial_rows || config.aggs.partial_rows);
    let table = tabify_agg_response(&aggs, &response, options)
        .context("failed to flatten response")?;

    print_table(&table, format)?;
    eprintln!("\n{} row(s), {} column(s)", table.row_count(), table.columns.len());
    Ok(())
}
