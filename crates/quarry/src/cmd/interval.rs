//! Interval command - validate and resolve date histogram intervals
//!
//! # Usage
//!
//! ```bash
//! quarry interval 15m
//! quarry interval auto --from now-7d
//! quarry interval 1s --from now-30d --to now
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use serde_json::{Value, json};

use quarry_aggs::{AUTO, date_histogram_interval, parse_opensearch_interval, resolve_interval};
use quarry_config::Config;

use super::input::time_range;
use super::output::print_json;

/// Interval command arguments
#[derive(Args, Debug)]
pub struct IntervalArgs {
    /// Interval text (`auto`, `15m`, `1M`, ...)
    #[arg(value_name = "INTERVAL")]
    interval: String,

    /// Start of the time range (e.g. now-24h); required for `auto`
    #[arg(long)]
    from: Option<String>,

    /// End of the time range
    #[arg(long, default_value = "now")]
    to: String,
}

/// Run the interval command
pub fn run(args: IntervalArgs, config: &Config) -> Result<()> {
    print_json(&describe(&args, config)?)
}

fn describe(args: &IntervalArgs, config: &Config) -> Result<Value> {
    let Some(range) = time_range(args.from.as_deref(), &args.to) else {
        if args.interval.trim() == AUTO {
            anyhow::bail!("auto interval requires --from");
        }
        let parsed = parse_opensearch_interval(&args.interval)?;
        return Ok(json!({
            "interval": args.interval.trim(),
            "kind": parsed.kind,
            "dsl": date_histogram_interval(&args.interval)?,
        }));
    };

    let range = range
        .to_absolute(Utc::now())
        .context("invalid time range")?;
    let resolved = resolve_interval(
        &args.interval,
        &range,
        config.aggs.bar_target,
        config.aggs.max_buckets,
    )?;
    let interval = resolved.interval.to_string();
    let kind = parse_opensearch_interval(&interval)?.kind;

    Ok(json!({
        "interval": interval,
        "kind": kind,
        "description": resolved.interval.describe(),
        "auto": resolved.auto,
        "scaled": resolved.scaled,
        "buckets": resolved.buckets,
        "dsl": date_histogram_interval(&interval)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(interval: &str, from: Option<&str>) -> IntervalArgs {
        IntervalArgs {
            interval: interval.to_string(),
            from: from.map(str::to_string),
            to: "now".to_string(),
        }
    }

    #[test]
    fn test_plain_interval() {
        let out = describe(&args("1M", None), &Config::default()).unwrap();
        assert_eq!(out["kind"], "calendar");
        assert_eq!(out["dsl"], json!({"calendar_interval": "1M"}));
    }

    #[test]
    fn test_auto_needs_range() {
        let err = describe(&args("auto", None), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("--from"));
    }

    #[test]
    fn test_auto_with_range() {
        let out = describe(&args("auto", Some("now-7d")), &Config::default()).unwrap();
        assert_eq!(out["auto"], true);
        assert!(out["buckets"].as_u64().unwrap() <= 100);
    }

    #[test]
    fn test_too_fine_interval_is_scaled() {
        let out = describe(&args("1s", Some("now-30d")), &Config::default()).unwrap();
        assert_eq!(out["scaled"], true);
        assert!(out["buckets"].as_u64().unwrap() <= 1000);
    }

    #[test]
    fn test_invalid_interval() {
        assert!(describe(&args("2M", None), &Config::default()).is_err());
        assert!(describe(&args("fortnight", None), &Config::default()).is_err());
    }
}
