//! Quarry Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid configuration - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use quarry_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[aggs]\nbar_target = 50").unwrap();
//! assert_eq!(config.aggs.bar_target, 50);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [query]
//! default_language = "kuery"
//! ignore_filter_if_field_not_in_index = true
//! date_format_tz = "Europe/Berlin"
//!
//! [query.query_string_options]
//! analyze_wildcard = true
//!
//! [aggs]
//! bar_target = 100
//! max_buckets = 1000
//!
//! [search]
//! timeout = "30s"
//! inspector_capacity = 100
//! ```

mod aggs;
mod error;
mod logging;
mod query;
mod search;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use aggs::AggsConfig;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use query::{KNOWN_LANGUAGES, QueryConfig};
pub use search::{RequestPreference, SearchConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Query building (KQL lowering, filters, query_string options)
    pub query: QueryConfig,

    /// Aggregation defaults (interval targets, tabify options)
    pub aggs: AggsConfig,

    /// Search request lifecycle (timeouts, inspector)
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
