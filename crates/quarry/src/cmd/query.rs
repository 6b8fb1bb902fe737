//! Query command - lower a user query and filters into the query DSL
//!
//! # Usage
//!
//! ```bash
//! quarry query 'status:500 and service:"checkout"' --index logs.json
//! quarry query 'status:[400 TO 499]' --language lucene --filters filters.json
//! quarry query 'response:200 or extension:php' --ast
//! ```
//!
//! Without `--index`, fields are not resolved: KQL terms lower to plain
//! `match` clauses and filters are kept regardless of field presence.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use quarry_config::Config;
use quarry_query::{Language, OpenSearchQueryConfig, Query, build_opensearch_query, parse_kuery};

use super::input::{load_filters, load_index};
use super::output::print_json;

/// Query command arguments
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Query text (empty matches everything)
    #[arg(value_name = "QUERY", default_value = "")]
    query: String,

    /// Query language (kuery, lucene); defaults to query.default_language
    #[arg(short = 'L', long)]
    language: Option<String>,

    /// Index pattern JSON file used to resolve fields
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// JSON array of filters to combine with the query
    #[arg(short, long)]
    filters: Option<PathBuf>,

    /// Print the parsed KQL tree instead of the DSL
    #[arg(long)]
    ast: bool,
}

/// Run the query command
pub fn run(args: QueryArgs, config: &Config) -> Result<()> {
    let language = resolve_language(args.language.as_deref(), config)?;

    if args.ast {
        if language != Language::Kuery {
            anyhow::bail!("--ast is only available for kuery queries");
        }
        let node = parse_kuery(&args.query).context("failed to parse query")?;
        return print_json(&node);
    }

    let index = load_index(args.index.as_deref())?;
    let filters = load_filters(args.filters.as_deref())?;
    let query = Query::new(language, args.query);

    let query_config = OpenSearchQueryConfig::from(&config.query);
    let dsl = build_opensearch_query(index.as_ref(), &[query], &filters, &query_config)
        .context("failed to build query")?;

    tracing::debug!(
        language = %language,
        filters = filters.len(),
        "built structured query"
    );
    print_json(&dsl.to_json())
}

/// `--language` flag, falling back to the configured default
pub fn resolve_language(flag: Option<&str>, config: &Config) -> Result<Language> {
    let name = flag.unwrap_or(&config.query.default_language);
    Ok(Language::parse(name)?)
}
