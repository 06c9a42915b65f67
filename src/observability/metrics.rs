//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_backend_connections_created_total` (counter): by service
//! - `gateway_auth_cache_total` (counter): token cache hits and misses
//! - `gateway_upstream_retries_total` (counter): transparent retries by service
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!(
        "gateway_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_connection_created(service: &'static str) {
    ::metrics::counter!("gateway_backend_connections_created_total", "service" => service)
        .increment(1);
}

/// `result` is `hit` or `miss`.
pub fn record_auth_cache(result: &'static str) {
    ::metrics::counter!("gateway_auth_cache_total", "result" => result).increment(1);
}

pub fn record_retry(service: &'static str) {
    ::metrics::counter!("gateway_upstream_retries_total", "service" => service).increment(1);
}
