//! Test fixtures.

use std::sync::Arc;
use std::time::Duration;

use backend_kit::cache::{CacheConfig, CacheConnection, CacheStore, MemoryConnector};
use serde::{Deserialize, Serialize};

/// Cache config with short delays for timer-driven tests.
#[must_use]
pub fn fast_cache_config(max_retries: u32) -> CacheConfig {
    CacheConfig::default()
        .with_max_retries(max_retries)
        .with_connect_timeout(Duration::from_secs(10))
        .with_reconnect_delay(Duration::from_millis(50))
        .with_health_check_interval(Duration::from_millis(500))
}

/// Uninitialized connection over a fresh in-memory backend.
#[must_use]
pub fn memory_connection(config: CacheConfig) -> (CacheConnection, MemoryConnector) {
    let connector = MemoryConnector::new();
    let connection = CacheConnection::new(config, Arc::new(connector.clone()));
    (connection, connector)
}

/// Initialized store over a fresh in-memory backend.
///
/// Must be called inside a tokio runtime; the link comes up once the
/// runtime has run the connect driver.
#[must_use]
pub fn memory_store() -> (CacheStore, MemoryConnector) {
    let (connection, connector) = memory_connection(CacheConfig::default());
    connection.initialize();
    (CacheStore::new(connection), connector)
}

/// Sample cached session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSession {
    /// User id
    pub user_id: String,
    /// Granted roles
    pub roles: Vec<String>,
    /// Issued-at, epoch seconds
    pub issued_at: i64,
}

impl SampleSession {
    /// An admin session.
    #[must_use]
    pub fn admin() -> Self {
        Self {
            user_id: "user-1".to_string(),
            roles: vec!["admin".to_string(), "user".to_string()],
            issued_at: 1_700_000_000,
        }
    }
}
