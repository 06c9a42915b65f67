//! Backend connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → manager.rs (acquire: healthy? reuse : cool-down? fail : reconnect)
//!     → connection.rs (channel + health state)
//!     → RPC invocation
//!     → manager.rs (mark_healthy / mark_unhealthy, release)
//! ```
//!
//! # Design Decisions
//! - At most one connection object per service identifier
//! - Reads of an established connection are lock-free (`arc-swap`)
//! - Creation and reconnects are serialised per service

pub mod connection;
pub mod manager;

pub use connection::{BackendConnection, HealthState};
pub use manager::{ConnectionPool, PoolError, PoolStats};
