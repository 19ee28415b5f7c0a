//! Retry-budget state machine for the cache-store link.
//!
//! The governor is pure: [`transition`] maps the current state and a link
//! event to the next state plus the side effects the connection must carry
//! out. Timers and disconnects live in [`CacheConnection`].
//!
//! `Reconnecting` and `Error` events draw from the same retry counter, so a
//! failing reconnect that reports both trips the budget twice as fast.
//!
//! [`CacheConnection`]: crate::cache::CacheConnection

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::cache::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RETRIES, FORCE_CLOSE_DELAY};

/// Lifecycle state of the supervised link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No handle has been created yet
    Uninitialized,
    /// Handle created, first connect in flight
    Connecting,
    /// Link is up
    Connected,
    /// A reconnect attempt is under way
    Reconnecting,
    /// The link reported an error
    Errored,
    /// Handle dropped; a fresh `initialize` restarts the cycle
    Closed,
}

impl LinkState {
    /// Whether the state belongs to a live handle.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Uninitialized | Self::Closed)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Errored => "errored",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Events reported by the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Connection established
    Connect,
    /// Connection ended
    End,
    /// A reconnect attempt started
    Reconnecting,
    /// The link failed with a message
    Error(String),
}

impl LinkEvent {
    /// Short event name used in log fields.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::End => "end",
            Self::Reconnecting => "reconnecting",
            Self::Error(_) => "error",
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Cancel the pending timeout guard, if any
    CancelTimeout,
    /// Arm (or re-arm) the timeout guard; firing it force-closes the link
    ArmTimeout(Duration),
    /// Force-close the link after the delay
    ScheduleForceClose(Duration),
}

/// Retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Consecutive reconnect/error events tolerated
    pub max_retries: u32,
    /// Timeout guard armed after each counted event below the budget
    pub connect_timeout: Duration,
    /// Delay before the forced close once the budget is spent
    pub force_close_delay: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            force_close_delay: FORCE_CLOSE_DELAY,
        }
    }
}

impl GovernorConfig {
    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// State carried between transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorState {
    /// Current lifecycle state
    pub link: LinkState,
    /// Consecutive reconnect/error events since the last reset
    pub current: u32,
}

impl GovernorState {
    /// Fresh state before any handle exists.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            link: LinkState::Uninitialized,
            current: 0,
        }
    }
}

impl Default for GovernorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only snapshot of the retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryInfo {
    /// Events counted so far
    pub current: u32,
    /// Budget
    pub max: u32,
    /// Events left before the forced close
    pub remaining: u32,
    /// `current/max`
    pub status: String,
}

impl RetryInfo {
    fn new(current: u32, max: u32) -> Self {
        Self {
            current,
            max,
            remaining: max.saturating_sub(current),
            status: format!("{current}/{max}"),
        }
    }
}

/// Compute the next state and effects for an event.
#[must_use]
pub fn transition(
    state: &GovernorState,
    event: &LinkEvent,
    config: &GovernorConfig,
) -> (GovernorState, Vec<Effect>) {
    if !state.link.is_active() {
        return (*state, Vec::new());
    }

    match event {
        LinkEvent::Connect => (
            GovernorState {
                link: LinkState::Connected,
                current: 0,
            },
            vec![Effect::CancelTimeout],
        ),
        LinkEvent::End => (*state, Vec::new()),
        LinkEvent::Reconnecting => count_failure(state, LinkState::Reconnecting, config),
        LinkEvent::Error(_) => count_failure(state, LinkState::Errored, config),
    }
}

fn count_failure(
    state: &GovernorState,
    next: LinkState,
    config: &GovernorConfig,
) -> (GovernorState, Vec<Effect>) {
    let current = state.current.saturating_add(1);
    let effect = if current >= config.max_retries {
        Effect::ScheduleForceClose(config.force_close_delay)
    } else {
        Effect::ArmTimeout(config.connect_timeout)
    };
    (GovernorState { link: next, current }, vec![effect])
}

/// Stateful wrapper around [`transition`].
#[derive(Debug, Clone)]
pub struct ReconnectGovernor {
    config: GovernorConfig,
    state: GovernorState,
}

impl ReconnectGovernor {
    /// Create a governor in the `Uninitialized` state.
    #[must_use]
    pub const fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            state: GovernorState::new(),
        }
    }

    /// Apply an event and return the effects to execute.
    pub fn apply(&mut self, event: &LinkEvent) -> Vec<Effect> {
        let (next, effects) = transition(&self.state, event, &self.config);
        self.state = next;
        effects
    }

    /// A new handle was created.
    pub const fn begin(&mut self) {
        self.state.link = LinkState::Connecting;
    }

    /// The handle was dropped by a close or forced close.
    pub fn closed(&mut self) -> Vec<Effect> {
        self.state = GovernorState {
            link: LinkState::Closed,
            current: 0,
        };
        vec![Effect::CancelTimeout]
    }

    /// Reset the counter without touching the lifecycle state.
    pub const fn reset(&mut self) {
        self.state.current = 0;
    }

    /// Whether the budget has been spent.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.state.current >= self.config.max_retries
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state.link
    }

    /// Counted events since the last reset.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.state.current
    }

    /// Retry settings.
    #[must_use]
    pub const fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Snapshot of the retry budget.
    #[must_use]
    pub fn retry_info(&self) -> RetryInfo {
        RetryInfo::new(self.state.current, self.config.max_retries)
    }
}
