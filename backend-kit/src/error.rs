//! Crate-wide error type.
//!
//! Every fallible helper in this crate returns [`KitError`]. Errors carry a
//! retryability classification so callers can decide whether to try again
//! once the cache or document store is reachable.

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used throughout the crate.
pub type KitResult<T> = Result<T, KitError>;

/// Common error type for backend-kit operations.
#[derive(Error, Debug)]
pub enum KitError {
    /// No live cache-store link is available
    #[error("cache store is not connected")]
    NotConnected,

    /// Cache-store command failed
    #[error("cache command failed: {0}")]
    Cache(#[from] redis::RedisError),

    /// Document-store operation failed
    #[error("document store error: {0}")]
    Document(#[from] mongodb::error::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key holds a value of another type
    #[error("Expected {expected} at key {key} but found type: {found}")]
    WrongType {
        /// Key that was inspected
        key: String,
        /// Type required by the operation
        expected: &'static str,
        /// Type actually stored
        found: String,
    },

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KitError {
    /// Check if this error is retryable.
    ///
    /// Connection-level failures and timeouts are transient; malformed input,
    /// wrong key types and decode failures are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use backend_kit::KitError;
    ///
    /// assert!(KitError::NotConnected.is_retryable());
    /// assert!(!KitError::invalid_input("empty key").is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotConnected | Self::Timeout(_) => true,
            Self::Cache(err) => {
                err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
            }
            _ => false,
        }
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a timeout error with the given message.
    #[must_use]
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a wrong-type error for a key.
    #[must_use]
    pub fn wrong_type(key: impl Into<String>, expected: &'static str, found: impl Into<String>) -> Self {
        Self::WrongType {
            key: key.into(),
            expected,
            found: found.into(),
        }
    }
}
