//! Typed key/value helpers over a [`CacheConnection`].
//!
//! Every helper logs its own failure and returns it as a value. Callers that
//! want the old "fall back to an empty answer" behavior can use
//! `unwrap_or_default()`, which yields `None`, `0`, an empty list or `false`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::cache::backend::CacheBackend;
use crate::cache::connection::CacheConnection;
use crate::error::{KitError, KitResult};

/// Expiry applied by [`CacheStore::increment`] when a counter is created.
pub const DEFAULT_COUNTER_TTL: Duration = Duration::from_secs(60);

/// Key/value facade.
#[derive(Clone)]
pub struct CacheStore {
    connection: CacheConnection,
}

impl CacheStore {
    /// Wrap a connection.
    #[must_use]
    pub const fn new(connection: CacheConnection) -> Self {
        Self { connection }
    }

    /// Underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &CacheConnection {
        &self.connection
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, key: &str, f: F) -> KitResult<T>
    where
        F: FnOnce(Arc<dyn CacheBackend>) -> Fut,
        Fut: Future<Output = KitResult<T>>,
    {
        let result = match self.connection.link() {
            Ok(link) => f(link).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            error!(operation, key, error = %err, "Cache operation failed");
        }
        result
    }

    /// Store `value` as JSON, optionally expiring after `ttl`.
    ///
    /// A TTL under one second is treated as no expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the command fails.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> KitResult<()>
    where
        T: Serialize + ?Sized,
    {
        let ttl = ttl.filter(|ttl| ttl.as_secs() > 0);
        self.run("set", key, |link| async move {
            let data = serde_json::to_string(value)?;
            link.set(key, data, ttl).await
        })
        .await
    }

    /// Fetch and decode a JSON value. Absent keys are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the stored value does not
    /// decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> KitResult<Option<T>> {
        self.run("get", key, |link| async move {
            match link.get(key).await? {
                Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Delete a key, returning 1 if it existed and 0 otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn delete(&self, key: &str) -> KitResult<u64> {
        self.run("delete", key, |link| async move { link.del(key).await })
            .await
    }

    /// Append values to the list at `key`, returning the new length.
    ///
    /// The key must be absent or already hold a list.
    ///
    /// # Errors
    ///
    /// Returns [`KitError::InvalidInput`] for an empty `values`,
    /// [`KitError::WrongType`] when the key holds another type, or the
    /// command failure.
    pub async fn push_to_list<V: ToString + Sync>(&self, key: &str, values: &[V]) -> KitResult<u64> {
        self.run("push_to_list", key, |link| async move {
            if values.is_empty() {
                return Err(KitError::invalid_input("push_to_list needs at least one value"));
            }
            let found = link.key_type(key).await?;
            if found != "none" && found != "list" {
                return Err(KitError::wrong_type(key, "list", found));
            }
            let values = values.iter().map(ToString::to_string).collect();
            link.rpush(key, values).await
        })
        .await
    }

    /// Every element of the list at `key`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn list_all(&self, key: &str) -> KitResult<Vec<String>> {
        self.run("list_all", key, |link| async move { link.lrange_all(key).await })
            .await
    }

    /// Remove occurrences of `value`; `count = 0` removes all of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_from_list(&self, key: &str, value: &str, count: i64) -> KitResult<u64> {
        self.run("remove_from_list", key, |link| async move {
            link.lrem(key, count, value).await
        })
        .await
    }

    /// Increment a counter that expires [`DEFAULT_COUNTER_TTL`] after creation.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn increment(&self, key: &str) -> KitResult<i64> {
        self.increment_with_ttl(key, DEFAULT_COUNTER_TTL).await
    }

    /// Increment a counter. Expiry is set only when the counter is created,
    /// so later increments never extend it. As with [`CacheStore::set`], a
    /// TTL under one second means no expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> KitResult<i64> {
        self.run("increment", key, |link| async move {
            let value = link.incr(key).await?;
            if value == 1 && ttl.as_secs() > 0 {
                let applied = link.expire(key, ttl).await?;
                debug!(key, ttl_secs = ttl.as_secs(), applied, "Counter expiry set");
            }
            Ok(value)
        })
        .await
    }

    /// Add a member to the set at `key`, returning 1 if it was new.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_add(&self, key: &str, member: &str) -> KitResult<u64> {
        self.run("set_add", key, |link| async move { link.sadd(key, member).await })
            .await
    }

    /// Remove a member, returning 1 if it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_remove(&self, key: &str, member: &str) -> KitResult<u64> {
        self.run("set_remove", key, |link| async move { link.srem(key, member).await })
            .await
    }

    /// Whether `member` belongs to the set.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_is_member(&self, key: &str, member: &str) -> KitResult<bool> {
        self.run("set_is_member", key, |link| async move {
            link.sismember(key, member).await
        })
        .await
    }

    /// Number of members.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_cardinality(&self, key: &str) -> KitResult<u64> {
        self.run("set_cardinality", key, |link| async move { link.scard(key).await })
            .await
    }

    /// All members, unordered.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_members(&self, key: &str) -> KitResult<Vec<String>> {
        self.run("set_members", key, |link| async move { link.smembers(key).await })
            .await
    }
}
