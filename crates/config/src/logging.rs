//! Logging configuration
//!
//! Controls how the `quarry` binary initializes its tracing subscriber.
//! The library crates only emit events; they never install a subscriber.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Verbosity of quarry's tracing events
///
/// Each level also shows everything logged at the levels below it.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Request state transitions inside the search coordinator
    Trace,
    /// Built query and aggregation bodies, tabify summaries, dropped requests
    Debug,
    /// Command-level events such as a Ctrl+C abort
    #[default]
    Info,
    /// Unknown fields, timeouts and partial responses
    Warn,
    /// Failures that end a command
    Error,
}

impl LogLevel {
    /// Name understood by an `EnvFilter` directive
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Shape of each emitted line
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact text for a terminal
    #[default]
    Console,
    /// One JSON object per event, for log shippers
    Json,
}

/// Log output destination
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard error; command results own stdout
    #[default]
    Stderr,
    /// Standard output, interleaved with results
    Stdout,
}

/// Logging configuration
///
/// # Example
///
/// ```toml
/// [log]
/// level = "info"
/// format = "console"
/// output = "stderr"
///
/// [log.targets]
/// quarry_search = "trace"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level (trace, debug, info, warn, error)
    /// Default: info
    pub level: LogLevel,

    /// Output format (console, json)
    /// Default: console
    pub format: LogFormat,

    /// Output destination (stderr, stdout)
    /// Default: stderr
    pub output: LogOutput,

    /// Per-target level overrides (target name → level)
    pub targets: BTreeMap<String, LogLevel>,
}

impl LogConfig {
    /// Build an `EnvFilter`-compatible directive string
    ///
    /// The default level comes first, followed by `target=level` pairs
    /// in target name order.
    pub fn directive(&self) -> String {
        let mut parts = vec![self.level.as_str().to_string()];
        parts.extend(
            self.targets
                .iter()
                .map(|(target, level)| format!("{}={}", target, level.as_str())),
        );
        parts.join(",")
    }
}
