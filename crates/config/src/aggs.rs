//! Aggregation configuration
//!
//! Defaults for automatic interval selection and response tabification.

use serde::Deserialize;

/// Aggregation configuration
///
/// # Example
///
/// ```toml
/// [aggs]
/// bar_target = 100
/// max_buckets = 1000
/// metrics_at_all_levels = false
/// partial_rows = false
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggsConfig {
    /// Target bucket count for `auto` date histogram intervals
    /// Default: 100
    pub bar_target: u32,

    /// Upper bound on buckets for explicit intervals before scaling kicks in
    /// Default: 1000
    pub max_buckets: u32,

    /// Emit metric columns at every bucket level when tabifying
    /// Default: false
    pub metrics_at_all_levels: bool,

    /// Keep rows with missing metric values when tabifying
    /// Default: false
    pub partial_rows: bool,
}

impl Default for AggsConfig {
    fn default() -> Self {
        Self {
            bar_target: 100,
            max_buckets: 1000,
            metrics_at_all_levels: false,
            partial_rows: false,
        }
    }
}
