//! Search request configuration

use std::time::Duration;

use serde::Deserialize;

/// Which shard copies serve a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPreference {
    /// Route every request of one session to the same copies
    #[default]
    SessionId,
    /// Send `custom_preference` verbatim
    Custom,
    /// Let the cluster choose
    None,
}

/// Search configuration
///
/// # Example
///
/// ```toml
/// [search]
/// timeout = "30s"
/// inspector_capacity = 100
/// preference = "custom"
/// custom_preference = "_local"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default per-request timeout
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Number of finished requests kept for inspection
    /// Default: 100
    pub inspector_capacity: usize,

    /// How the `preference` request parameter is chosen
    /// Default: session_id
    pub preference: RequestPreference,

    /// Sent as the preference when `preference = "custom"`
    /// Default: "_local"
    pub custom_preference: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            inspector_capacity: 100,
            preference: RequestPreference::default(),
            custom_preference: "_local".to_string(),
        }
    }
}

impl SearchConfig {
    /// Preference to send, given the caller's session id
    pub fn preference_for(&self, session_id: &str) -> Option<String> {
        match self.preference {
            RequestPreference::SessionId => Some(session_id.to_string()),
            RequestPreference::Custom => Some(self.custom_preference.clone()),
            RequestPreference::None => None,
        }
    }
}
