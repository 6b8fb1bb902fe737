//! Configuration validation
//!
//! Validates config consistency:
//! - The default query language is one the engine knows
//! - Interval targets are positive and ordered (`bar_target <= max_buckets`)
//! - Search timeout and inspector capacity are non-zero
//! - A custom request preference has a value

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::query::KNOWN_LANGUAGES;
use crate::search::RequestPreference;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_query(config)?;
    validate_aggs(config)?;
    validate_search(config)?;
    Ok(())
}

fn validate_query(config: &Config) -> Result<()> {
    let language = config.query.default_language.as_str();
    if !KNOWN_LANGUAGES.contains(&language) {
        return Err(ConfigError::invalid_value(
            "query",
            "default_language",
            format!(
                "unknown language '{}' (expected one of: {})",
                language,
                KNOWN_LANGUAGES.join(", ")
            ),
        ));
    }
    Ok(())
}

fn validate_aggs(config: &Config) -> Result<()> {
    let aggs = &config.aggs;
    if aggs.bar_target == 0 {
        return Err(ConfigError::invalid_value(
            "aggs",
            "bar_target",
            "must be greater than 0",
        ));
    }
    if aggs.max_buckets < aggs.bar_target {
        return Err(ConfigError::invalid_value(
            "aggs",
            "max_buckets",
            format!(
                "must be at least bar_target ({}), got {}",
                aggs.bar_target, aggs.max_buckets
            ),
        ));
    }
    Ok(())
}

fn validate_search(config: &Config) -> Result<()> {
    if config.search.timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "search",
            "timeout",
            "must be greater than 0",
        ));
    }
    if config.search.inspector_capacity == 0 {
        return Err(ConfigError::invalid_value(
            "search",
            "inspector_capacity",
            "must be greater than 0",
        ));
    }
    if config.search.preference == RequestPreference::Custom
        && config.search.custom_preference.trim().is_empty()
    {
        return Err(ConfigError::invalid_value(
            "search",
            "custom_preference",
            "must not be empty when preference = \"custom\"",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_unknown_language() {
        let err = Config::from_str("[query]\ndefault_language = \"graphql\"").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("default_language"));
        assert!(msg.contains("graphql"));
    }

    #[test]
    fn test_max_buckets_below_target() {
        let err = Config::from_str("[aggs]\nbar_target = 200\nmax_buckets = 100").unwrap_err();
        assert!(err.to_string().contains("max_buckets"));
    }

    #[test]
    fn test_zero_timeout() {
        let err = Config::from_str("[search]\ntimeout = \"0s\"").unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_empty_custom_preference() {
        let err = Config::from_str("[search]\npreference = \"custom\"\ncustom_preference = \"\"")
            .unwrap_err();
        assert!(err.to_string().contains("custom_preference"));

        // Ignored unless the custom mode is selected
        assert!(Config::from_str("[search]\ncustom_preference = \"\"").is_ok());
    }

    #[test]
    fn test_zero_inspector_capacity() {
        let err = Config::from_str("[search]\ninspector_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("inspector_capacity"));
    }
}
