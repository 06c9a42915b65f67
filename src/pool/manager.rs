//! Connection pool management.
//!
//! # Responsibilities
//! - Hold exactly one connection per backend service
//! - Create connections lazily on first acquisition
//! - Reconnect degraded connections with bounded backoff
//! - Fail fast while a service is cooling down

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tonic::Status;

use crate::config::{GatewayConfig, PoolConfig};
use crate::observability::metrics;
use crate::pool::connection::{BackendConnection, HealthState};
use crate::resilience::{CircuitBreaker, ReconnectBackoff};
use crate::routing::catalog::{find_domain, ServiceId};
use crate::rpc::{Connector, ServiceEndpoint};

/// Acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("service {service} is unavailable: {reason}")]
    Unavailable { service: ServiceId, reason: String },
    #[error("no endpoint configured for service {0}")]
    UnknownService(ServiceId),
}

/// Counters exposed for tests and logs.
#[derive(Debug, Default)]
pub struct PoolStats {
    acquisitions: AtomicU64,
    connections_created: AtomicU64,
}

impl PoolStats {
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    pub fn connections_created(&self) -> u64 {
        self.connections_created.load(Ordering::Relaxed)
    }
}

/// Per-service pool state.
struct ServiceSlot {
    endpoint: ServiceEndpoint,
    /// Current connection; readers never block.
    current: ArcSwapOption<BackendConnection>,
    /// Serialises connection creation and reconnects.
    connecting: Mutex<()>,
    breaker: CircuitBreaker,
    /// Connect attempts since the last successful connect.
    attempts: AtomicU32,
    generation: AtomicU64,
}

/// One long-lived connection per backend service.
pub struct ConnectionPool {
    slots: HashMap<ServiceId, ServiceSlot>,
    connector: Arc<dyn Connector>,
    config: PoolConfig,
    backoff: ReconnectBackoff,
    stats: PoolStats,
}

impl ConnectionPool {
    pub fn new(
        endpoints: Vec<ServiceEndpoint>,
        connector: Arc<dyn Connector>,
        config: PoolConfig,
    ) -> Self {
        let slots = endpoints
            .into_iter()
            .map(|endpoint| {
                let slot = ServiceSlot {
                    endpoint: endpoint.clone(),
                    current: ArcSwapOption::empty(),
                    connecting: Mutex::new(()),
                    breaker: CircuitBreaker::from_config(&config),
                    attempts: AtomicU32::new(0),
                    generation: AtomicU64::new(0),
                };
                (endpoint.service, slot)
            })
            .collect();

        Self {
            slots,
            connector,
            backoff: ReconnectBackoff::from_config(&config),
            config,
            stats: PoolStats::default(),
        }
    }

    /// Build the pool from the configured service addresses.
    pub fn from_config(config: &GatewayConfig, connector: Arc<dyn Connector>) -> Self {
        let endpoints = config
            .services
            .iter()
            .filter_map(|(domain, svc)| {
                find_domain(domain).map(|d| ServiceEndpoint {
                    service: d.service_id(),
                    uri: svc.uri(),
                })
            })
            .collect();
        Self::new(endpoints, connector, config.pool.clone())
    }

    /// Get the connection for `service`, creating or reconnecting it if needed.
    pub async fn acquire(&self, service: ServiceId) -> Result<Arc<BackendConnection>, PoolError> {
        let slot = self
            .slots
            .get(&service)
            .ok_or(PoolError::UnknownService(service))?;
        self.stats.acquisitions.fetch_add(1, Ordering::Relaxed);

        if let Some(conn) = healthy(&slot.current) {
            return Ok(conn);
        }

        if let Some(remaining) = slot.breaker.remaining() {
            return Err(PoolError::Unavailable {
                service,
                reason: format!("cooling down for {}ms", remaining.as_millis()),
            });
        }

        let _guard = slot.connecting.lock().await;

        // Another request may have reconnected while we waited.
        if let Some(conn) = healthy(&slot.current) {
            return Ok(conn);
        }
        if slot.breaker.is_open() {
            return Err(PoolError::Unavailable {
                service,
                reason: "cooling down".to_string(),
            });
        }

        let previous = slot.current.load_full();
        let attempt = slot.attempts.fetch_add(1, Ordering::Relaxed);
        if attempt > 0 || previous.is_some() {
            let delay = self.backoff.delay(attempt.saturating_sub(1));
            tracing::info!(
                service = %service,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting backend"
            );
            tokio::time::sleep(delay).await;
        }

        match self.connector.connect(&slot.endpoint).await {
            Ok(channel) => {
                let generation = slot.generation.fetch_add(1, Ordering::Relaxed) + 1;
                let conn = Arc::new(BackendConnection::new(service, generation, channel));
                slot.current.store(Some(conn.clone()));
                slot.attempts.store(0, Ordering::Relaxed);
                self.stats.connections_created.fetch_add(1, Ordering::Relaxed);
                metrics::record_connection_created(service.as_str());
                tracing::info!(service = %service, generation, "Backend connection created");
                Ok(conn)
            }
            Err(err) => {
                if let Some(previous) = previous {
                    previous.mark_unreachable();
                }
                if slot.breaker.record_failure() {
                    tracing::warn!(
                        service = %service,
                        cooldown_ms = self.config.cooldown_ms,
                        "Backend failing repeatedly, cooling down"
                    );
                }
                tracing::warn!(service = %service, error = %err, "Backend connect failed");
                Err(PoolError::Unavailable {
                    service,
                    reason: err.reason,
                })
            }
        }
    }

    /// Return a connection after use. Channels are shared, so nothing to do yet.
    pub fn release(&self, conn: Arc<BackendConnection>) {
        drop(conn);
    }

    /// A call on `conn` failed in a way that implicates the connection.
    pub fn mark_unhealthy(&self, conn: &BackendConnection, error: &Status) {
        let Some(slot) = self.slots.get(&conn.service()) else {
            return;
        };
        conn.mark_degraded();
        if slot.breaker.record_failure() {
            tracing::warn!(
                service = %conn.service(),
                cooldown_ms = self.config.cooldown_ms,
                "Backend failing repeatedly, cooling down"
            );
        }
        tracing::warn!(
            service = %conn.service(),
            generation = conn.generation(),
            code = ?error.code(),
            "Backend connection degraded"
        );
    }

    /// A call on `conn` succeeded.
    pub fn mark_healthy(&self, conn: &BackendConnection) {
        if conn.state() != HealthState::Healthy {
            conn.mark_healthy();
        }
        if let Some(slot) = self.slots.get(&conn.service()) {
            slot.breaker.record_success();
        }
    }

    /// The connection currently held for `service`, without creating one.
    pub fn current(&self, service: ServiceId) -> Option<Arc<BackendConnection>> {
        self.slots.get(&service).and_then(|s| s.current.load_full())
    }

    /// Remaining cool-down of `service`.
    pub fn cooldown_remaining(&self, service: ServiceId) -> Option<Duration> {
        self.slots.get(&service).and_then(|s| s.breaker.remaining())
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceEndpoint> {
        self.slots.values().map(|s| &s.endpoint)
    }
}

fn healthy(current: &ArcSwapOption<BackendConnection>) -> Option<Arc<BackendConnection>> {
    current.load_full().filter(|c| c.is_healthy())
}
