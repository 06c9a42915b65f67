//! Protocol transcoding subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route + path params + query + body
//!     → request.rs (schema-checked RPC message)
//!     → [backend invocation]
//!     → response.rs (status mapping, JSON payload or {"error": ...})
//! ```
//!
//! # Design Decisions
//! - Pure functions; no I/O and no shared state
//! - Total over the route table: every route has exactly one mapping

pub mod request;
pub mod response;

pub use request::{to_rpc_request, RpcRequest, TranscodeError};
pub use response::{map_status, to_http_response};
