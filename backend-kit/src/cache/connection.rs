//! Supervised cache-store connection.
//!
//! [`CacheConnection`] owns at most one live handle. A spawned driver task
//! connects, health-checks and reconnects, reporting each step to the
//! [`ReconnectGovernor`]; the governor's effects (timeout guards, forced
//! closes) are executed here. All state sits behind one mutex and is never
//! held across an `.await`.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::backend::{CacheBackend, CacheConnector};
use crate::cache::config::CacheConfig;
use crate::cache::governor::{Effect, LinkEvent, LinkState, ReconnectGovernor, RetryInfo};
use crate::cache::redis_backend::RedisConnector;
use crate::error::{KitError, KitResult};

/// Error code reported when the timeout guard fires.
pub const CONNECT_FAILED_CODE: i32 = -99;

/// Message reported when the timeout guard fires.
pub const CONNECT_FAILED_MESSAGE: &str = "Connect to Redis failed";

struct Handle {
    generation: u64,
    link: Option<Arc<dyn CacheBackend>>,
    driver: Option<JoinHandle<()>>,
}

struct Inner {
    governor: ReconnectGovernor,
    handle: Option<Handle>,
    pending_timeout: Option<JoinHandle<()>>,
    next_generation: u64,
}

impl Inner {
    fn current_generation(&self) -> Option<u64> {
        self.handle.as_ref().map(|h| h.generation)
    }

    fn cancel_timeout(&mut self) {
        if let Some(timer) = self.pending_timeout.take() {
            timer.abort();
        }
    }
}

struct Shared {
    config: CacheConfig,
    connector: Arc<dyn CacheConnector>,
    inner: Mutex<Inner>,
}

/// Explicitly owned handle to the process's cache-store connection.
///
/// Cloning is cheap; all clones supervise the same connection.
#[derive(Clone)]
pub struct CacheConnection {
    shared: Arc<Shared>,
}

impl CacheConnection {
    /// Create an uninitialized connection using the given connector.
    #[must_use]
    pub fn new(config: CacheConfig, connector: Arc<dyn CacheConnector>) -> Self {
        let governor = ReconnectGovernor::new(config.governor_config());
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                inner: Mutex::new(Inner {
                    governor,
                    handle: None,
                    pending_timeout: None,
                    next_generation: 0,
                }),
            }),
        }
    }

    /// Create an uninitialized connection to the Redis server in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the URL cannot
    /// be parsed. No network I/O happens here.
    pub fn redis(config: CacheConfig) -> KitResult<Self> {
        config.validate()?;
        let connector = RedisConnector::new(&config.connection_url())?;
        Ok(Self::new(config, Arc::new(connector)))
    }

    /// Create the handle and start connecting in the background.
    ///
    /// Returns `false` without side effects when a handle already exists.
    /// Connection failures are logged and handed to the retry path; they
    /// are never returned here.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn initialize(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.handle.is_some() {
            debug!("Cache connection already initialized");
            return false;
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.governor.begin();

        info!(
            endpoint = %self.shared.connector.endpoint(),
            attempt = 1,
            max_retries = self.shared.config.max_retries,
            "Initial cache connection attempt"
        );

        let driver = tokio::spawn(drive(Arc::downgrade(&self.shared), generation));
        inner.handle = Some(Handle {
            generation,
            link: None,
            driver: Some(driver),
        });
        true
    }

    /// Report a link event observed outside the driver.
    ///
    /// Returns `false` when there is no handle to apply it to.
    pub fn notify(&self, event: LinkEvent) -> bool {
        let generation = self.shared.inner.lock().current_generation();
        generation.is_some_and(|generation| self.shared.dispatch(generation, &event))
    }

    /// Drop the connection without waiting for in-flight commands.
    ///
    /// The handle is cleared, the counter reset and any timeout guard
    /// cancelled even if the disconnect itself fails. Safe to call when
    /// already closed.
    pub async fn force_close(&self) {
        self.shared.force_close(None).await;
    }

    /// Gracefully quit the connection if it is open.
    pub async fn close(&self) {
        let handle = {
            let mut inner = self.shared.inner.lock();
            let handle = inner.handle.take();
            for effect in inner.governor.closed() {
                self.shared.execute(&mut inner, 0, effect);
            }
            handle
        };

        let link = handle.and_then(|mut handle| {
            if let Some(driver) = handle.driver.take() {
                driver.abort();
            }
            handle.link
        });

        match link.filter(|link| link.is_open()) {
            Some(link) => match link.quit().await {
                Ok(()) => info!("Cache connection closed"),
                Err(err) => error!(
                    error = %err,
                    operation = "disconnect",
                    graceful = false,
                    "Cache connection close failed"
                ),
            },
            None => info!("No active cache connection to close"),
        }
    }

    /// Snapshot of the retry budget.
    #[must_use]
    pub fn retry_info(&self) -> RetryInfo {
        self.shared.inner.lock().governor.retry_info()
    }

    /// Reset the retry counter to zero.
    pub fn reset_retry_count(&self) {
        let mut inner = self.shared.inner.lock();
        inner.governor.reset();
        info!(
            action = "retry_count_reset",
            new_count = inner.governor.current(),
            "Cache retry count reset"
        );
    }

    /// Whether a handle exists and its link reports itself open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        let inner = self.shared.inner.lock();
        inner
            .handle
            .as_ref()
            .and_then(|h| h.link.as_ref())
            .is_some_and(|link| link.is_open())
    }

    /// Whether a handle exists, connected or not.
    #[must_use]
    pub fn has_handle(&self) -> bool {
        self.shared.inner.lock().handle.is_some()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.shared.inner.lock().governor.state()
    }

    /// The live link.
    ///
    /// # Errors
    ///
    /// Returns [`KitError::NotConnected`] when no open link exists.
    pub fn link(&self) -> KitResult<Arc<dyn CacheBackend>> {
        let inner = self.shared.inner.lock();
        inner
            .handle
            .as_ref()
            .and_then(|h| h.link.clone())
            .filter(|link| link.is_open())
            .ok_or(KitError::NotConnected)
    }

    /// Connection configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }
}

impl Shared {
    /// Apply an event to the given generation. Returns `false` if stale.
    fn dispatch(self: &Arc<Self>, generation: u64, event: &LinkEvent) -> bool {
        let mut inner = self.inner.lock();
        if inner.current_generation() != Some(generation) {
            return false;
        }

        let effects = inner.governor.apply(event);
        log_event(event, &inner.governor);
        for effect in effects {
            self.execute(&mut inner, generation, effect);
        }
        true
    }

    fn execute(self: &Arc<Self>, inner: &mut Inner, generation: u64, effect: Effect) {
        match effect {
            Effect::CancelTimeout => inner.cancel_timeout(),
            Effect::ArmTimeout(after) => {
                inner.cancel_timeout();
                let shared = Arc::downgrade(self);
                inner.pending_timeout = Some(tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    if let Some(shared) = shared.upgrade() {
                        shared.on_timeout(generation, after).await;
                    }
                }));
            }
            Effect::ScheduleForceClose(after) => {
                let shared = Arc::downgrade(self);
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    if let Some(shared) = shared.upgrade() {
                        shared.force_close(Some(generation)).await;
                    }
                });
            }
        }
    }

    async fn on_timeout(self: &Arc<Self>, generation: u64, after: Duration) {
        {
            let mut inner = self.inner.lock();
            if inner.current_generation() != Some(generation) {
                return;
            }
            // Detach instead of aborting: this task is the pending timer.
            inner.pending_timeout.take();
        }

        error!(
            code = CONNECT_FAILED_CODE,
            timeout_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
            reason = "connection_timeout",
            "{CONNECT_FAILED_MESSAGE}"
        );
        self.force_close(Some(generation)).await;
    }

    /// Force-close the current handle, or only `expected` when given.
    async fn force_close(self: &Arc<Self>, expected: Option<u64>) {
        let handle = {
            let mut inner = self.inner.lock();
            let current = inner.current_generation();
            if expected.is_some() && expected != current {
                debug!(?expected, ?current, "Skipping stale forced close");
                return;
            }
            let handle = inner.handle.take();
            for effect in inner.governor.closed() {
                self.execute(&mut inner, current.unwrap_or(0), effect);
            }
            handle
        };

        let Some(mut handle) = handle else {
            debug!("Forced close requested without an active cache connection");
            return;
        };
        if let Some(driver) = handle.driver.take() {
            driver.abort();
        }

        if let Some(link) = handle.link.filter(|link| link.is_open()) {
            match link.disconnect().await {
                Ok(()) => info!(
                    reason = "force_close_initiated",
                    connection_state = "closed",
                    "Cache connection force-closed"
                ),
                Err(err) => error!(
                    error = %err,
                    operation = "force_disconnect",
                    graceful = false,
                    "Cache forced close failed"
                ),
            }
        }
    }

    fn install(&self, generation: u64, link: &Arc<dyn CacheBackend>) -> bool {
        let mut inner = self.inner.lock();
        match inner.handle.as_mut() {
            Some(handle) if handle.generation == generation => {
                handle.link = Some(Arc::clone(link));
                true
            }
            _ => false,
        }
    }

    fn uninstall(&self, generation: u64, link: &Arc<dyn CacheBackend>) {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.handle.as_mut() {
            let same = handle
                .link
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, link));
            if handle.generation == generation && same {
                handle.link = None;
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.cancel_timeout();
        if let Some(driver) = inner.handle.as_mut().and_then(|h| h.driver.take()) {
            driver.abort();
        }
    }
}

fn log_event(event: &LinkEvent, governor: &ReconnectGovernor) {
    let info = governor.retry_info();
    match event {
        LinkEvent::Connect => info!("Cache connection established"),
        LinkEvent::End => info!("Cache connection ended"),
        LinkEvent::Reconnecting if governor.is_exhausted() => error!(
            retry_count = info.current,
            max_retries = info.max,
            final_attempt = true,
            error_source = "reconnect_max_retries_exceeded",
            "Cache reconnect retries exhausted"
        ),
        LinkEvent::Reconnecting => info!(
            attempt = info.current,
            max_retries = info.max,
            retry_status = %info.status,
            source = "reconnect_event",
            "Cache reconnect attempt"
        ),
        LinkEvent::Error(message) => {
            error!(
                error = %message,
                retry_count = info.current,
                max_retries = info.max,
                retry_attempt = %info.status,
                error_source = "event_handler",
                "Cache connection error"
            );
            if governor.is_exhausted() {
                error!(
                    retry_count = info.current,
                    max_retries = info.max,
                    final_attempt = true,
                    error_source = "error_max_retries_exceeded",
                    "Cache error retries exhausted"
                );
            }
        }
    }
}

/// Connect, watch, reconnect. Exits when the generation goes stale.
async fn drive(shared: Weak<Shared>, generation: u64) {
    let mut attempt: u32 = 0;

    loop {
        let Some(this) = shared.upgrade() else { return };
        if attempt > 0 && !this.dispatch(generation, &LinkEvent::Reconnecting) {
            return;
        }
        attempt = attempt.saturating_add(1);
        let connector = Arc::clone(&this.connector);
        let reconnect_delay = this.config.reconnect_delay;
        let health_interval = this.config.health_check_interval;
        drop(this);

        match connector.connect().await {
            Ok(link) => {
                let installed = shared
                    .upgrade()
                    .is_some_and(|this| this.install(generation, &link));
                if !installed {
                    discard(link.as_ref()).await;
                    return;
                }
                if let Some(this) = shared.upgrade() {
                    this.dispatch(generation, &LinkEvent::Connect);
                }

                let failure = watch(link.as_ref(), health_interval).await;

                let Some(this) = shared.upgrade() else { return };
                this.uninstall(generation, &link);
                if !this.dispatch(generation, &LinkEvent::Error(failure.to_string())) {
                    return;
                }
                this.dispatch(generation, &LinkEvent::End);
            }
            Err(err) => {
                let Some(this) = shared.upgrade() else { return };
                if attempt == 1 {
                    warn!(
                        error = %err,
                        error_source = "initial_connection_attempt",
                        will_retry_via_events = true,
                        "Initial cache connection failed"
                    );
                }
                if !this.dispatch(generation, &LinkEvent::Error(err.to_string())) {
                    return;
                }
            }
        }

        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Ping until the link fails; returns the failure.
async fn watch(link: &dyn CacheBackend, interval: Duration) -> KitError {
    loop {
        tokio::time::sleep(interval).await;
        if let Err(err) = link.ping().await {
            return err;
        }
    }
}

// Close a link whose handle was replaced or dropped while it connected.
async fn discard(link: &dyn CacheBackend) {
    if let Err(err) = link.disconnect().await {
        debug!(error = %err, operation = "discard_link", "Cache disconnect of unused link failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryConnector;

    fn connection(max_retries: u32) -> (CacheConnection, MemoryConnector) {
        let connector = MemoryConnector::new();
        let config = CacheConfig::default().with_max_retries(max_retries);
        (CacheConnection::new(config, Arc::new(connector.clone())), connector)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_is_idempotent() {
        let (conn, connector) = connection(3);
        assert!(conn.initialize());
        assert!(!conn.initialize());
        settle().await;

        assert!(conn.is_connected());
        assert_eq!(conn.state(), LinkState::Connected);
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_connected_before_initialize() {
        let (conn, _connector) = connection(3);
        assert!(!conn.is_connected());
        assert!(!conn.has_handle());
        assert!(matches!(conn.link(), Err(KitError::NotConnected)));
        assert!(!conn.notify(LinkEvent::Connect));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_force_closes_once() {
        let (conn, connector) = connection(3);
        conn.initialize();
        settle().await;

        for _ in 0..3 {
            conn.notify(LinkEvent::Error("socket closed".into()));
        }
        assert!(conn.has_handle());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!conn.has_handle());
        assert!(!conn.is_connected());
        assert_eq!(conn.state(), LinkState::Closed);
        assert_eq!(conn.retry_info().current, 0);
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_budget_keeps_handle() {
        let (conn, _connector) = connection(3);
        conn.initialize();
        settle().await;

        conn.notify(LinkEvent::Reconnecting);
        conn.notify(LinkEvent::Error("timeout".into()));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(conn.has_handle());
        assert_eq!(conn.retry_info().status, "2/3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_guard_force_closes() {
        let (conn, _connector) = connection(3);
        conn.initialize();
        settle().await;

        conn.notify(LinkEvent::Reconnecting);
        tokio::time::sleep(Duration::from_secs(99)).await;
        assert!(conn.has_handle());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!conn.has_handle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_cancels_timeout_guard() {
        let (conn, _connector) = connection(3);
        conn.initialize();
        settle().await;

        conn.notify(LinkEvent::Error("blip".into()));
        conn.notify(LinkEvent::Connect);
        assert_eq!(conn.retry_info().current, 0);

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(conn.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_initial_failure() {
        let (conn, connector) = connection(3);
        connector.fail_next_connects(1);
        conn.initialize();
        settle().await;
        assert!(!conn.is_connected());
        assert_eq!(conn.retry_info().current, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(conn.is_connected());
        assert_eq!(conn.retry_info().current, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_server_closes_then_reinitializes() {
        let (conn, connector) = connection(3);
        connector.fail_next_connects(100);
        conn.initialize();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!conn.has_handle());
        assert_eq!(conn.state(), LinkState::Closed);

        connector.fail_next_connects(0);
        assert!(conn.initialize());
        settle().await;
        assert!(conn.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_severed_link_reconnects() {
        let (conn, connector) = connection(3);
        conn.initialize();
        settle().await;

        connector.sever();
        assert!(!conn.is_connected());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(conn.is_connected());
        assert_eq!(connector.connects(), 2);
        assert_eq!(conn.retry_info().current, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_quits_gracefully() {
        let (conn, connector) = connection(3);
        conn.initialize();
        settle().await;
        conn.notify(LinkEvent::Error("x".into()));

        conn.close().await;
        assert!(!conn.has_handle());
        assert_eq!(conn.retry_info().current, 0);
        assert_eq!(connector.quits(), 1);

        conn.close().await;
        assert_eq!(connector.quits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_close_when_closed_is_noop() {
        let (conn, connector) = connection(3);
        conn.force_close().await;
        assert!(!conn.has_handle());
        assert_eq!(connector.disconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_force_close_spares_new_handle() {
        let (conn, _connector) = connection(2);
        conn.initialize();
        settle().await;

        conn.notify(LinkEvent::Error("a".into()));
        conn.notify(LinkEvent::Error("b".into()));
        conn.force_close().await;
        conn.initialize();
        settle().await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_discard_disconnects_unused_link() {
        let connector = MemoryConnector::new();
        let link = connector.connect().await.unwrap();

        discard(link.as_ref()).await;
        assert!(!link.is_open());
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_retry_count() {
        let (conn, _connector) = connection(5);
        conn.initialize();
        settle().await;
        conn.notify(LinkEvent::Reconnecting);
        conn.notify(LinkEvent::Reconnecting);

        conn.reset_retry_count();
        assert_eq!(conn.retry_info().current, 0);
    }
}
