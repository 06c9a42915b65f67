//! Backend RPC client subsystem.
//!
//! # Data Flow
//! ```text
//! Connection pool
//!     → channel.rs (Connector establishes a channel per service)
//!     → channel.rs (RpcChannel::invoke with deadline + metadata)
//!     → codec.rs (JSON message in gRPC framing)
//!     → Backend service
//! ```

pub mod channel;
pub mod codec;

pub use channel::{
    ConnectError, Connector, GrpcChannel, GrpcConnector, RpcCall, RpcChannel, ServiceEndpoint,
};
pub use codec::JsonCodec;
