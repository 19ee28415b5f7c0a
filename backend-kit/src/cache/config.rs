//! Cache-store connection configuration.

use std::time::Duration;

use crate::cache::governor::GovernorConfig;
use crate::config::{self, ConfigError};

/// Default retry budget before a connection is force-closed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default guard timeout for a reconnect attempt that never settles.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(100_000);

/// Delay between exhausting the retry budget and the forced close.
pub const FORCE_CLOSE_DELAY: Duration = Duration::from_millis(1000);

/// Cache-store connection configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Host, optionally with `:port`
    pub host: String,
    /// Port. Not part of the connection URL; kept for callers and logs
    pub port: u16,
    /// Optional user name
    pub user: Option<String>,
    /// Optional password
    pub pass: Option<String>,
    /// Consecutive reconnect/error events tolerated
    pub max_retries: u32,
    /// Guard timeout armed after each failed attempt
    pub connect_timeout: Duration,
    /// Delay before a budget-exhausted connection is closed
    pub force_close_delay: Duration,
    /// Pause between reconnect attempts
    pub reconnect_delay: Duration,
    /// Interval between liveness pings on an open link
    pub health_check_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            user: None,
            pass: None,
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            force_close_delay: FORCE_CLOSE_DELAY,
            reconnect_delay: Duration::from_millis(500),
            health_check_interval: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Loads configuration from `REDIS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        config::load_dotenv();
        let defaults = Self::default();

        let cfg = Self {
            host: config::string_env("REDIS_HOST", &defaults.host),
            port: config::parse_env("REDIS_PORT", defaults.port)?,
            user: config::optional_env("REDIS_USER"),
            pass: config::optional_env("REDIS_PASS"),
            max_retries: config::parse_env("REDIS_MAX_RETRIES", defaults.max_retries)?,
            connect_timeout: Duration::from_millis(config::parse_env(
                "REDIS_CONNECT_TIMEOUT",
                100_000u64,
            )?),
            ..defaults
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingRequired("REDIS_HOST".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidRetryBudget);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("connect_timeout"));
        }
        Ok(())
    }

    /// Set host and port.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set credentials.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.pass = Some(pass.into());
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the reconnect guard timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the pause between reconnect attempts.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the health-check interval.
    #[must_use]
    pub const fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Build the connection URL.
    ///
    /// Credentials are included only when both user and password are set,
    /// and are percent-encoded. The port is not appended; put it in `host`
    /// when it differs from the server default.
    ///
    /// ```
    /// use backend_kit::cache::CacheConfig;
    ///
    /// let cfg = CacheConfig::default().with_host("localhost", 6379);
    /// assert_eq!(cfg.connection_url(), "redis://localhost");
    /// ```
    #[must_use]
    pub fn connection_url(&self) -> String {
        match (self.user.as_deref(), self.pass.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => format!(
                "redis://{}:{}@{}",
                urlencoding::encode(user),
                urlencoding::encode(pass),
                self.host
            ),
            _ => format!("redis://{}", self.host),
        }
    }

    /// Retry settings for the reconnect governor.
    #[must_use]
    pub const fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            max_retries: self.max_retries,
            connect_timeout: self.connect_timeout,
            force_close_delay: self.force_close_delay,
        }
    }
}
