//! Cache-store connection management and key/value helpers.
//!
//! A [`CacheConnection`] is created once at startup, initialized, and then
//! shared (it is cheap to clone) with a [`CacheStore`] wherever values are
//! read or written. Link failures are counted by a [`ReconnectGovernor`];
//! when the budget runs out the connection is force-closed and stays closed
//! until the next `initialize`.
//!
//! ```no_run
//! use backend_kit::cache::{CacheConfig, CacheConnection, CacheStore};
//!
//! # async fn run() -> backend_kit::KitResult<()> {
//! let connection = CacheConnection::redis(CacheConfig::from_env()?)?;
//! connection.initialize();
//!
//! let store = CacheStore::new(connection.clone());
//! store.set("greeting", &"hello", None).await?;
//! let greeting: Option<String> = store.get("greeting").await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod governor;
pub mod memory;
pub mod redis_backend;
pub mod store;

pub use backend::{CacheBackend, CacheConnector};
pub use config::CacheConfig;
pub use connection::CacheConnection;
pub use governor::{
    Effect, GovernorConfig, GovernorState, LinkEvent, LinkState, ReconnectGovernor, RetryInfo,
    transition,
};
pub use memory::{MemoryBackend, MemoryConnector};
pub use redis_backend::{RedisBackend, RedisConnector};
pub use store::CacheStore;
