//! HTTP → RPC edge gateway library.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request id, tracing, limits, CORS)
//!                         │
//!                         ▼
//!                     http::dispatcher
//!                         │  routing      (verb + path → RouteEntry)
//!                         │  security     (bearer token → AuthContext)
//!                         │  pool         (one connection per service)
//!                         │  transcode    (JSON ⇄ RPC message)
//!                         │  rpc          (tonic unary call, JSON codec)
//!                         ▼
//!                     Backend services (helpdesk, ticket, issues, track, network, faq)
//!
//!     Cross-cutting: config, observability, resilience, lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod transcode;

// Backend access
pub mod pool;
pub mod rpc;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use http::{Dispatcher, GatewayServer};
pub use lifecycle::Shutdown;
