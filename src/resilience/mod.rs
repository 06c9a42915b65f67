//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend call:
//!     → timeouts.rs (per-request deadline over acquire, backoff and every attempt)
//!     → On failure: retries.rs (transient? idempotent? budget left?)
//!     → circuit_breaker.rs (failures in quick succession → cool-down)
//!     → backoff.rs (delay before reconnecting a degraded connection)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Retries only for idempotent operations, at most once
//! - Cool-down fails fast instead of hammering a downed backend

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::ReconnectBackoff;
pub use circuit_breaker::CircuitBreaker;
pub use retries::{is_transient, RetryPolicy};
pub use timeouts::{DeadlineElapsed, RequestDeadline};
