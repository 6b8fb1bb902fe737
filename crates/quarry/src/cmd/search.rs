//! Search command - run a full search against a recorded response
//!
//! Composes the request from an index pattern, query, filters, time range
//! and agg configs, then dispatches it through the search coordinator to a
//! replay backend. Ctrl+C aborts the request.
//!
//! # Usage
//!
//! ```bash
//! quarry search --index logs.json --response response.json \
//!     --query 'status:500' --aggs aggs.json --from now-24h
//!
//! # Exercise the timeout path
//! quarry search --index logs.json --response response.json --delay-ms 5000 --timeout-ms 100
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use serde_json::Value;
use tokio::signal;

use quarry_config::Config;
use quarry_query::{IndexPattern, OpenSearchQueryConfig, Query};
use quarry_search::{
    CancellationToken, RequestRecord, ReplayBackend, SearchCoordinator, SearchOptions,
    SearchSource, get_request_inspector_stats, get_response_inspector_stats, new_session_id,
};

use super::input::{load_aggs, load_filters, read_json, time_range};
use super::output::{parse_format, print_json, print_table};
use super::query::resolve_language;

/// Search command arguments
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Index pattern JSON file
    #[arg(short, long)]
    index: PathBuf,

    /// Recorded response the replay backend answers with
    #[arg(short, long)]
    response: PathBuf,

    /// Query text
    #[arg(short, long)]
    query: Option<String>,

    /// Query language (kuery, lucene); defaults to query.default_language
    #[arg(short = 'L', long)]
    language: Option<String>,

    /// JSON array of filters
    #[arg(short, long)]
    filters: Option<PathBuf>,

    /// JSON array of agg configs
    #[arg(short, long)]
    aggs: Option<PathBuf>,

    /// Start of the time range (e.g. now-24h)
    #[arg(long)]
    from: Option<String>,

    /// End of the time range
    #[arg(long, default_value = "now")]
    to: String,

    /// Number of hits to request
    #[arg(long, default_value_t = 0)]
    size: u64,

    /// Request preference; defaults to the search.preference mode
    #[arg(long)]
    preference: Option<String>,

    /// Request timeout in milliseconds; defaults to search.timeout
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Delay before the replay backend answers
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Output format for the table (table, json, csv)
    #[arg(long, default_value = "table")]
    format: String,

    /// Print the raw response instead of the table
    #[arg(long)]
    raw: bool,

    /// Print inspector stats and the request body to stderr
    #[arg(long)]
    inspect: bool,
}

/// Run the search command
pub async fn run(args: SearchArgs, config: &Config) -> Result<()> {
    let format = parse_format(&args.format)?;
    let index: IndexPattern = read_json(&args.index, "index pattern")?;
    let source = build_source(&args, index.clone(), config)?;

    let response: Value = read_json(&args.response, "response")?;
    let mut backend = ReplayBackend::new(response);
    if args.delay_ms > 0 {
        backend = backend.with_delay(Duration::from_millis(args.delay_ms));
    }
    let coordinator = SearchCoordinator::new(Arc::new(backend), &config.search);

    let abort = CancellationToken::new();
    let mut options = SearchOptions::new().with_signal(abort.clone());
    if let Some(timeout_ms) = args.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms));
    }

    let abort_on_ctrl_c = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("aborting search");
            abort.cancel();
        }
    });
    let result = source.fetch(&coordinator, options, Utc::now()).await;
    abort_on_ctrl_c.abort();

    if args.inspect
        && let Some(record) = coordinator.inspector().last()
    {
        print_inspector(&record, &index)?;
    }

    let response = result.context("search failed")?;
    match response.table {
        Some(table) if !args.raw => {
            print_table(&table, format)?;
            eprintln!("\n{} row(s) [{}]", table.row_count(), coordinator.backend_name());
        }
        _ => print_json(&response.raw)?,
    }
    Ok(())
}

fn build_source(args: &SearchArgs, index: IndexPattern, config: &Config) -> Result<SearchSource> {
    let filters = load_filters(args.filters.as_deref())?;
    let mut source = SearchSource::new(index.clone())
        .with_filters(filters)
        .with_size(args.size)
        .with_search_config(&config.search, &new_session_id())
        .with_query_config(OpenSearchQueryConfig::from(&config.query))
        .with_aggs_config(config.aggs.clone());

    if let Some(preference) = &args.preference {
        source = source.with_preference(preference.as_str());
    }
    if let Some(text) = &args.query {
        let language = resolve_language(args.language.as_deref(), config)?;
        source = source.with_query(Query::new(language, text.as_str()));
    }
    if let Some(path) = &args.aggs {
        source = source.with_aggs(Arc::new(load_aggs(path, Some(&index))?));
    }
    if let Some(range) = time_range(args.from.as_deref(), &args.to) {
        source = source.with_time_range(range);
    }
    Ok(source)
}

fn print_inspector(record: &RequestRecord, index: &IndexPattern) -> Result<()> {
    let stats = get_request_inspector_stats(record, Some(index))
        .into_iter()
        .chain(get_response_inspector_stats(record));
    for stat in stats {
        eprintln!("{:<20} {}", stat.label, stat.value);
    }
    if let Some(error) = &record.error {
        eprintln!("{:<20} {}", "Error", error);
    }
    eprintln!("\n{}", serde_json::to_string_pretty(&record.request)?);
    Ok(())
}
