//! Environment-driven configuration helpers.
//!
//! Each component owns its config struct (`CacheConfig`, `DocumentConfig`,
//! `LoggingConfig`) with builder-style setters; the `from_env` loaders share
//! the parsing helpers in this module.

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid retry budget
    #[error("Invalid retry budget: must be greater than 0")]
    InvalidRetryBudget,

    /// Invalid timeout value
    #[error("Invalid timeout for {0}: must be greater than 0")]
    InvalidTimeout(&'static str),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Load `.env` once before reading variables. Missing files are fine.
pub(crate) fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Parse an environment variable with a default value.
pub(crate) fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Read a string variable, falling back to `default`.
pub(crate) fn string_env(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read an optional string variable; empty values count as unset.
pub(crate) fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Parse a comma-separated `key=value` list.
pub(crate) fn parse_pairs_env(name: &str) -> Vec<(String, String)> {
    env::var(name)
        .map(|v| {
            v.split(',')
                .filter_map(|pair| {
                    let (k, val) = pair.split_once('=')?;
                    let k = k.trim();
                    (!k.is_empty()).then(|| (k.to_string(), val.trim().to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}
