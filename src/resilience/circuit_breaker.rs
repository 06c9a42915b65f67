//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, acquisitions may reconnect
//! - Open: backend assumed down, acquisitions fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold within window
//! Open → Closed: cool-down elapsed (next acquisition probes with a reconnect)
//! Any → Closed (counts reset): a call succeeds
//! ```
//!
//! # Design Decisions
//! - Per-service breaker (not global)
//! - Fail fast in Open state, no network activity
//! - Mutation is serialised by a short, non-async lock; `is_open` is a read

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::PoolConfig;

#[derive(Debug, Default)]
struct BreakerState {
    /// Start of the current counting window.
    window_start: Option<Instant>,
    failures: u32,
    open_until: Option<Instant>,
}

/// Failure-window breaker guarding one backend service.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    window: Duration,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, window: Duration, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            window,
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_millis(config.failure_window_ms),
            Duration::from_millis(config.cooldown_ms),
        )
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while the cool-down is running.
    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    fn is_open_at(&self, now: Instant) -> bool {
        matches!(self.lock().open_until, Some(until) if now < until)
    }

    /// Time left in the cool-down, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.lock()
            .open_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|d| !d.is_zero())
    }

    /// Count a failure; returns true if this failure opened the breaker.
    pub fn record_failure(&self) -> bool {
        self.record_failure_at(Instant::now())
    }

    fn record_failure_at(&self, now: Instant) -> bool {
        let mut state = self.lock();

        if matches!(state.open_until, Some(until) if now < until) {
            return false;
        }

        let in_window = state
            .window_start
            .map(|start| now.duration_since(start) <= self.window)
            .unwrap_or(false);
        if !in_window {
            state.window_start = Some(now);
            state.failures = 0;
        }
        state.failures += 1;

        if state.failures >= self.threshold {
            state.open_until = Some(now + self.cooldown);
            state.window_start = None;
            state.failures = 0;
            return true;
        }
        false
    }

    /// A successful call closes the breaker and clears the window.
    pub fn record_success(&self) {
        *self.lock() = BreakerState::default();
    }
}
