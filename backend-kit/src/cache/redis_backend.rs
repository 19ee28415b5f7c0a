//! Redis implementation of the cache backend seams.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::backend::{CacheBackend, CacheConnector};
use crate::error::{KitError, KitResult};

/// Opens multiplexed tokio connections to a Redis server.
pub struct RedisConnector {
    client: redis::Client,
}

impl RedisConnector {
    /// Create a connector for the given `redis://` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(url: &str) -> KitResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CacheConnector for RedisConnector {
    async fn connect(&self) -> KitResult<Arc<dyn CacheBackend>> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        debug!(endpoint = %self.endpoint(), "Redis link established");
        Ok(Arc::new(RedisBackend::new(conn)))
    }

    fn endpoint(&self) -> String {
        let info = self.client.get_connection_info();
        info.addr.to_string()
    }
}

/// A single multiplexed Redis link.
pub struct RedisBackend {
    conn: RwLock<Option<MultiplexedConnection>>,
    open: AtomicBool,
}

impl RedisBackend {
    fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn: RwLock::new(Some(conn)),
            open: AtomicBool::new(true),
        }
    }

    /// Clone the multiplexed handle for one command.
    async fn conn(&self) -> KitResult<MultiplexedConnection> {
        self.conn.read().await.clone().ok_or(KitError::NotConnected)
    }

    async fn take(&self) -> Option<MultiplexedConnection> {
        self.open.store(false, Ordering::SeqCst);
        self.conn.write().await.take()
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> KitResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn disconnect(&self) -> KitResult<()> {
        // Dropping the last handle tears the socket down.
        drop(self.take().await);
        Ok(())
    }

    async fn quit(&self) -> KitResult<()> {
        if let Some(mut conn) = self.take().await {
            let _: () = redis::cmd("QUIT").query_async(&mut conn).await?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> KitResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KitResult<()> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> KitResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.del(key).await?)
    }

    async fn key_type(&self, key: &str) -> KitResult<String> {
        let mut conn = self.conn().await?;
        let kind: String = redis::cmd("TYPE").arg(key).query_async(&mut conn).await?;
        Ok(kind)
    }

    async fn rpush(&self, key: &str, values: Vec<String>) -> KitResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.rpush(key, values).await?)
    }

    async fn lrange_all(&self, key: &str) -> KitResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.lrange(key, 0, -1).await?)
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> KitResult<u64> {
        let mut conn = self.conn().await?;
        let count = isize::try_from(count).map_err(|e| KitError::invalid_input(e.to_string()))?;
        Ok(conn.lrem(key, count, value).await?)
    }

    async fn incr(&self, key: &str) -> KitResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.incr(key, 1).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KitResult<bool> {
        let mut conn = self.conn().await?;
        let secs = i64::try_from(ttl.as_secs()).map_err(|e| KitError::invalid_input(e.to_string()))?;
        Ok(conn.expire(key, secs).await?)
    }

    async fn ttl(&self, key: &str) -> KitResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.ttl(key).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> KitResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.sadd(key, member).await?)
    }

    async fn srem(&self, key: &str, member: &str) -> KitResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.srem(key, member).await?)
    }

    async fn sismember(&self, key: &str, member: &str) -> KitResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.sismember(key, member).await?)
    }

    async fn scard(&self, key: &str) -> KitResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.scard(key).await?)
    }

    async fn smembers(&self, key: &str) -> KitResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.smembers(key).await?)
    }
}
