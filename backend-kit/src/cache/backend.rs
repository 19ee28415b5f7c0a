//! Seams between the connection supervisor and the wire client.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::KitResult;

/// A live link to a cache store.
///
/// Values are plain strings; JSON encoding happens in [`CacheStore`].
///
/// [`CacheStore`]: crate::cache::CacheStore
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Whether the link reports itself open.
    fn is_open(&self) -> bool;

    /// Round-trip liveness check.
    async fn ping(&self) -> KitResult<()>;

    /// Drop the link without waiting for in-flight commands.
    async fn disconnect(&self) -> KitResult<()>;

    /// Ask the server to close the link, then drop it.
    async fn quit(&self) -> KitResult<()>;

    /// `GET`
    async fn get(&self, key: &str) -> KitResult<Option<String>>;

    /// `SET`, or `SET EX` when a TTL is given.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KitResult<()>;

    /// `DEL`, returning the number of keys removed.
    async fn del(&self, key: &str) -> KitResult<u64>;

    /// `TYPE`, `"none"` for a missing key.
    async fn key_type(&self, key: &str) -> KitResult<String>;

    /// `RPUSH`, returning the new length.
    async fn rpush(&self, key: &str, values: Vec<String>) -> KitResult<u64>;

    /// `LRANGE key 0 -1`
    async fn lrange_all(&self, key: &str) -> KitResult<Vec<String>>;

    /// `LREM`; `count = 0` removes every occurrence.
    async fn lrem(&self, key: &str, count: i64, value: &str) -> KitResult<u64>;

    /// `INCR`
    async fn incr(&self, key: &str) -> KitResult<i64>;

    /// `EXPIRE`, returning whether a timeout was set.
    async fn expire(&self, key: &str, ttl: Duration) -> KitResult<bool>;

    /// `TTL` in seconds; `-1` without expiry, `-2` when missing.
    async fn ttl(&self, key: &str) -> KitResult<i64>;

    /// `SADD`
    async fn sadd(&self, key: &str, member: &str) -> KitResult<u64>;

    /// `SREM`
    async fn srem(&self, key: &str, member: &str) -> KitResult<u64>;

    /// `SISMEMBER`
    async fn sismember(&self, key: &str, member: &str) -> KitResult<bool>;

    /// `SCARD`
    async fn scard(&self, key: &str) -> KitResult<u64>;

    /// `SMEMBERS`
    async fn smembers(&self, key: &str) -> KitResult<Vec<String>>;
}

/// Opens links for the supervisor's connect driver.
#[async_trait]
pub trait CacheConnector: Send + Sync {
    /// Establish a new link.
    async fn connect(&self) -> KitResult<Arc<dyn CacheBackend>>;

    /// Endpoint description for logs; never contains credentials.
    fn endpoint(&self) -> String;
}
