//! Backend connection abstraction.
//!
//! # Responsibilities
//! - Wrap the live channel to one backend service
//! - Track health state (Healthy/Degraded/Unreachable)
//! - Remember when the connection last failed

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::rpc::RpcChannel;
use crate::routing::catalog::ServiceId;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy = 0,
    Degraded = 1,
    Unreachable = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            0 => HealthState::Healthy,
            1 => HealthState::Degraded,
            _ => HealthState::Unreachable,
        }
    }
}

/// A live channel to one backend service, owned by the pool.
pub struct BackendConnection {
    service: ServiceId,
    /// Sequence number of this connection within its service (1 = first).
    generation: u64,
    channel: Arc<dyn RpcChannel>,
    created_at: Instant,
    state: AtomicU8,
    /// Milliseconds after `created_at` of the last failure, plus one; 0 = never.
    last_failure: AtomicU64,
}

impl BackendConnection {
    pub fn new(service: ServiceId, generation: u64, channel: Arc<dyn RpcChannel>) -> Self {
        Self {
            service,
            generation,
            channel,
            created_at: Instant::now(),
            state: AtomicU8::new(HealthState::Healthy as u8),
            last_failure: AtomicU64::new(0),
        }
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn channel(&self) -> &dyn RpcChannel {
        self.channel.as_ref()
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_healthy(&self) -> bool {
        self.state() == HealthState::Healthy
    }

    pub fn last_failure(&self) -> Option<Instant> {
        match self.last_failure.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(self.created_at + Duration::from_millis(ms - 1)),
        }
    }

    /// Report a failed call.
    pub fn mark_degraded(&self) {
        self.record_failure_time();
        // Never downgrade Unreachable back to Degraded.
        let _ = self.state.compare_exchange(
            HealthState::Healthy as u8,
            HealthState::Degraded as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Reconnecting failed; this connection is finished.
    pub fn mark_unreachable(&self) {
        self.record_failure_time();
        self.state
            .store(HealthState::Unreachable as u8, Ordering::Release);
    }

    /// Report a successful call.
    pub fn mark_healthy(&self) {
        self.state.store(HealthState::Healthy as u8, Ordering::Release);
    }

    fn record_failure_time(&self) {
        let ms = self.created_at.elapsed().as_millis() as u64;
        self.last_failure.store(ms + 1, Ordering::Relaxed);
    }
}

impl fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConnection")
            .field("service", &self.service)
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}
