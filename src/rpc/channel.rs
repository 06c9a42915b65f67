//! RPC channels and the connector that creates them.
//!
//! # Responsibilities
//! - Invoke a backend method by its fully-qualified name
//! - Attach deadline and caller metadata to each call
//! - Establish channels to backend endpoints
//!
//! # Design Decisions
//! - `RpcChannel` and `Connector` are traits so the pool can be exercised
//!   without a network
//! - One tonic `Channel` is cloned per call; clones share the HTTP/2 connection

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use crate::rpc::codec::JsonCodec;
use crate::routing::catalog::ServiceId;

/// One unary backend invocation.
#[derive(Debug, Clone)]
pub struct RpcCall {
    /// `package.Service/Method`.
    pub method: String,
    pub message: Value,
    /// Sent to the backend as `grpc-timeout`.
    pub deadline: Duration,
    pub metadata: Vec<(&'static str, String)>,
}

/// A live channel to one backend service.
#[async_trait]
pub trait RpcChannel: Send + Sync + 'static {
    async fn invoke(&self, call: RpcCall) -> Result<Value, Status>;
}

/// Network location of one backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub service: ServiceId,
    /// Absolute URI, e.g. `http://localhost:50052`.
    pub uri: String,
}

/// Failed to establish a channel.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot connect to {service} at {uri}: {reason}")]
pub struct ConnectError {
    pub service: ServiceId,
    pub uri: String,
    pub reason: String,
}

impl ConnectError {
    pub fn new(endpoint: &ServiceEndpoint, reason: impl fmt::Display) -> Self {
        Self {
            service: endpoint.service,
            uri: endpoint.uri.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Creates channels for the connection pool.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &ServiceEndpoint) -> Result<Arc<dyn RpcChannel>, ConnectError>;
}

/// tonic channel speaking gRPC with JSON messages.
#[derive(Debug, Clone)]
pub struct GrpcChannel {
    channel: Channel,
}

impl GrpcChannel {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl RpcChannel for GrpcChannel {
    async fn invoke(&self, call: RpcCall) -> Result<Value, Status> {
        let path: PathAndQuery = format!("/{}", call.method)
            .parse()
            .map_err(|_| Status::internal(format!("invalid method path '{}'", call.method)))?;

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {}", e)))?;

        let mut request = tonic::Request::new(call.message);
        request.set_timeout(call.deadline);
        for (key, value) in call.metadata {
            match MetadataValue::try_from(value.as_str()) {
                Ok(value) => {
                    request.metadata_mut().insert(key, value);
                }
                Err(_) => tracing::debug!(key, "dropping non-ASCII metadata value"),
            }
        }

        let response = grpc.unary(request, path, JsonCodec).await?;
        Ok(response.into_inner())
    }
}

/// Connects plaintext HTTP/2 channels with a bounded connect timeout.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    connect_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    async fn connect(&self, endpoint: &ServiceEndpoint) -> Result<Arc<dyn RpcChannel>, ConnectError> {
        let channel = Endpoint::from_shared(endpoint.uri.clone())
            .map_err(|e| ConnectError::new(endpoint, e))?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await
            .map_err(|e| ConnectError::new(endpoint, e))?;

        tracing::debug!(service = %endpoint.service, uri = %endpoint.uri, "Backend channel established");
        Ok(Arc::new(GrpcChannel::new(channel)))
    }
}
