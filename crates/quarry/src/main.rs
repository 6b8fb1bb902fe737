//! Quarry - query, filter and aggregation engine
//!
//! # Usage
//!
//! ```bash
//! # Lower a KQL query (and filters) into the query DSL
//! quarry query 'status:500 and service:"checkout"' --index logs.json
//!
//! # Resolve a date histogram interval against a time range
//! quarry interval auto --from now-7d
//!
//! # Build the aggregation request for a set of agg configs
//! quarry aggs aggs.json --index logs.json --from now-24h
//!
//! # Flatten a recorded response into a table
//! quarry tabify aggs.json response.json --format csv
//!
//! # Run a full search against a recorded response
//! quarry search --index logs.json --response response.json --aggs aggs.json
//! ```

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quarry_config::{Config, LogFormat, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Quarry - query, filter and aggregation engine
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the structured query for a KQL or lucene query and filters
    Query(cmd::query::QueryArgs),

    /// Validate and resolve a date histogram interval
    Interval(cmd::interval::IntervalArgs),

    /// Build the aggregation request for a list of agg configs
    Aggs(cmd::aggs::AggsArgs),

    /// Flatten an aggregation response into a table
    Tabify(cmd::tabify::TabifyArgs),

    /// Compose, dispatch and flatten a search against a recorded response
    Search(cmd::search::SearchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config, cli.log_level.as_deref())?;

    match cli.command {
        Command::Query(args) => cmd::query::run(args, &config),
        Command::Interval(args) => cmd::interval::run(args, &config),
        Command::Aggs(args) => cmd::aggs::run(args, &config),
        Command::Tabify(args) => cmd::tabify::run(args, &config),
        Command::Search(args) => cmd::search::run(args, &config).await,
    }
}

/// Load the config file, falling back to default paths and then defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path)
            .with_context(|| format!("failed to load config file: {}", path.display()));
    }

    for candidate in ["quarry.toml", "configs/quarry.toml"] {
        let path = Path::new(candidate);
        if path.exists() {
            return Config::from_file(path)
                .with_context(|| format!("failed to load config file: {}", path.display()));
        }
    }

    Ok(Config::default())
}

/// Resolve the filter directive: CLI flag > config file > default "info"
fn resolve_log_directive(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => config.log.directive(),
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(config: &Config, cli_level: Option<&str>) -> Result<()> {
    let directive = resolve_log_directive(cli_level, config);
    let filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let writer = || match config.log.output {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
    };

    let (console, json) = match config.log.format {
        LogFormat::Console => (
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(writer()),
            ),
            None,
        ),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(writer()))),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(json)
        .with(filter)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cli_flag_wins() {
        let config = Config::from_str("[log]\nlevel = \"warn\"").unwrap();
        assert_eq!(resolve_log_directive(Some("trace"), &config), "trace");
    }

    #[test]
    fn test_config_directive_used() {
        let config =
            Config::from_str("[log]\nlevel = \"warn\"\n[log.targets]\nquarry_search = \"debug\"")
                .unwrap();
        assert_eq!(
            resolve_log_directive(None, &config),
            "warn,quarry_search=debug"
        );
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(resolve_log_directive(None, &Config::default()), "info");
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/quarry.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["quarry", "interval", "auto", "--from", "now-7d"]).unwrap();
        assert!(matches!(cli.command, Command::Interval(_)));

        let cli = Cli::try_parse_from(["quarry", "-l", "debug", "query", "status:500"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Query(_)));
    }
}
