//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, limits, CORS)
//!     → dispatcher.rs (route → auth → pool → transcode → invoke → transcode)
//!     → error.rs (uniform {"error": ...} envelope for every rejection)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod error;
pub mod server;

pub use dispatcher::{Dispatcher, ProxyRequest, ProxyResponse, Stage};
pub use error::GatewayError;
pub use server::GatewayServer;
