//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher  → request count + latency per route and status
//! pool        → connections created per service, retries
//! interceptor → token cache hits and misses
//!     → metrics.rs → Prometheus scrape endpoint (optional)
//!
//! every subsystem → tracing events → logging.rs → stdout (pretty or JSON)
//! ```
//!
//! `RUST_LOG` overrides the configured level.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
