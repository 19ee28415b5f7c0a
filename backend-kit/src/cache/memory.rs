//! In-process cache backend.
//!
//! Mirrors the Redis semantics the facade relies on (key types, wrong-type
//! errors, expiry) so the supervisor and facade can run without a server.
//! The connector can be scripted to fail connects and to sever live links.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::backend::{CacheBackend, CacheConnector};
use crate::error::{KitError, KitResult};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
    Set(BTreeSet<String>),
}

impl Value {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Keyspace shared by every link a [`MemoryConnector`] hands out.
#[derive(Debug, Default)]
struct Keyspace {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Keyspace {
    /// Run `f` against the live entry map, purging expired keys first.
    fn with<R>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> R) -> R {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.is_live(now));
        f(&mut entries)
    }
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicU32,
    disconnects: AtomicU32,
    quits: AtomicU32,
}

/// Connector producing [`MemoryBackend`] links over one shared keyspace.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    keyspace: Arc<Keyspace>,
    counters: Arc<Counters>,
    failing_connects: Arc<AtomicU32>,
    links: Arc<Mutex<Vec<Weak<MemoryBackend>>>>,
}

impl MemoryConnector {
    /// Create a connector with an empty keyspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Mark every link handed out so far as dropped by the server.
    pub fn sever(&self) {
        self.links.lock().retain(|link| {
            link.upgrade()
                .inspect(|link| link.open.store(false, Ordering::SeqCst))
                .is_some()
        });
    }

    /// Links handed out that are still referenced somewhere.
    #[must_use]
    pub fn live_links(&self) -> usize {
        self.links.lock().iter().filter(|link| link.strong_count() > 0).count()
    }

    /// Successful connects so far.
    #[must_use]
    pub fn connects(&self) -> u32 {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Non-graceful disconnects so far.
    #[must_use]
    pub fn disconnects(&self) -> u32 {
        self.counters.disconnects.load(Ordering::SeqCst)
    }

    /// Graceful quits so far.
    #[must_use]
    pub fn quits(&self) -> u32 {
        self.counters.quits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheConnector for MemoryConnector {
    async fn connect(&self) -> KitResult<Arc<dyn CacheBackend>> {
        let failing = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(KitError::Internal("connection refused".to_string()));
        }

        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let link = Arc::new(MemoryBackend {
            keyspace: Arc::clone(&self.keyspace),
            counters: Arc::clone(&self.counters),
            open: AtomicBool::new(true),
        });
        let mut links = self.links.lock();
        links.retain(|link| link.strong_count() > 0);
        links.push(Arc::downgrade(&link));
        drop(links);
        Ok(link)
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

/// A link into the in-process keyspace.
pub struct MemoryBackend {
    keyspace: Arc<Keyspace>,
    counters: Arc<Counters>,
    open: AtomicBool,
}

impl MemoryBackend {
    fn ensure_open(&self) -> KitResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(KitError::NotConnected)
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> KitResult<R>) -> KitResult<R> {
        self.ensure_open()?;
        self.keyspace.with(f)
    }
}

fn wrong_type(key: &str, expected: &'static str, value: &Value) -> KitError {
    KitError::wrong_type(key, expected, value.type_name())
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn ping(&self) -> KitResult<()> {
        self.ensure_open()
    }

    async fn disconnect(&self) -> KitResult<()> {
        self.open.store(false, Ordering::SeqCst);
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn quit(&self) -> KitResult<()> {
        self.ensure_open()?;
        self.open.store(false, Ordering::SeqCst);
        self.counters.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> KitResult<Option<String>> {
        self.with(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(key, "string", other)),
        })
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KitResult<()> {
        self.with(|entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value),
                    expires_at: ttl.map(|ttl| Instant::now() + ttl),
                },
            );
            Ok(())
        })
    }

    async fn del(&self, key: &str) -> KitResult<u64> {
        self.with(|entries| Ok(u64::from(entries.remove(key).is_some())))
    }

    async fn key_type(&self, key: &str) -> KitResult<String> {
        self.with(|entries| {
            Ok(entries
                .get(key)
                .map_or("none", |e| e.value.type_name())
                .to_string())
        })
    }

    async fn rpush(&self, key: &str, values: Vec<String>) -> KitResult<u64> {
        self.with(|entries| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::List(Vec::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::List(list) => {
                    list.extend(values);
                    Ok(list.len() as u64)
                }
                other => Err(wrong_type(key, "list", other)),
            }
        })
    }

    async fn lrange_all(&self, key: &str) -> KitResult<Vec<String>> {
        self.with(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(list.clone()),
            Some(other) => Err(wrong_type(key, "list", other)),
        })
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> KitResult<u64> {
        self.with(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(0);
            };
            let Value::List(list) = &mut entry.value else {
                return Err(wrong_type(key, "list", &entry.value));
            };

            let limit = usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX);
            let limit = if count == 0 { usize::MAX } else { limit };
            let mut removed = 0usize;

            if count >= 0 {
                list.retain(|item| {
                    if removed < limit && item == value {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
            } else {
                let mut kept: Vec<String> = Vec::with_capacity(list.len());
                for item in list.drain(..).rev() {
                    if removed < limit && item == value {
                        removed += 1;
                    } else {
                        kept.push(item);
                    }
                }
                kept.reverse();
                *list = kept;
            }

            if list.is_empty() {
                entries.remove(key);
            }
            Ok(removed as u64)
        })
    }

    async fn incr(&self, key: &str) -> KitResult<i64> {
        self.with(|entries| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Str("0".to_string()),
                expires_at: None,
            });
            let Value::Str(raw) = &mut entry.value else {
                return Err(wrong_type(key, "string", &entry.value));
            };
            let next = raw
                .parse::<i64>()
                .ok()
                .and_then(|n| n.checked_add(1))
                .ok_or_else(|| KitError::invalid_input("value is not an integer or out of range"))?;
            *raw = next.to_string();
            Ok(next)
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KitResult<bool> {
        self.with(|entries| {
            Ok(entries.get_mut(key).is_some_and(|entry| {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }))
        })
    }

    async fn ttl(&self, key: &str) -> KitResult<i64> {
        self.with(|entries| {
            Ok(match entries.get(key) {
                None => -2,
                Some(Entry { expires_at: None, .. }) => -1,
                Some(Entry {
                    expires_at: Some(at),
                    ..
                }) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    i64::try_from((remaining.as_millis() + 500) / 1000).unwrap_or(i64::MAX)
                }
            })
        })
    }

    async fn sadd(&self, key: &str, member: &str) -> KitResult<u64> {
        self.with(|entries| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Set(BTreeSet::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Set(set) => Ok(u64::from(set.insert(member.to_string()))),
                other => Err(wrong_type(key, "set", other)),
            }
        })
    }

    async fn srem(&self, key: &str, member: &str) -> KitResult<u64> {
        self.with(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(0);
            };
            let Value::Set(set) = &mut entry.value else {
                return Err(wrong_type(key, "set", &entry.value));
            };
            let removed = set.remove(member);
            if set.is_empty() {
                entries.remove(key);
            }
            Ok(u64::from(removed))
        })
    }

    async fn sismember(&self, key: &str, member: &str) -> KitResult<bool> {
        self.with(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(other) => Err(wrong_type(key, "set", other)),
        })
    }

    async fn scard(&self, key: &str) -> KitResult<u64> {
        self.with(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::Set(set)) => Ok(set.len() as u64),
            Some(other) => Err(wrong_type(key, "set", other)),
        })
    }

    async fn smembers(&self, key: &str) -> KitResult<Vec<String>> {
        self.with(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(other) => Err(wrong_type(key, "set", other)),
        })
    }
}
