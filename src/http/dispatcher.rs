//! Request dispatcher.
//!
//! # State Machine
//! ```text
//! Received → Routing → Authenticating → Pooling → TranscodingRequest
//!          → Invoking → TranscodingResponse → Responded
//!
//! Rejected from: Routing (404), Authenticating (401), Pooling (503),
//!                TranscodingRequest (400/413), Invoking (mapped status)
//! ```
//!
//! # Design Decisions
//! - Route lookup is a pure in-memory step and runs first, so unknown paths are
//!   404 whatever the credentials; authentication still completes before the
//!   pool or the transcoder is touched
//! - Idempotent operations get one transparent retry on a transient failure;
//!   writes never do
//! - The route deadline covers the whole forward: acquisition, reconnect
//!   backoff and every attempt; backends are sent the time that is left
//! - Panics are caught here and answered with 500; the process keeps serving
//! - Dropping the handler future (client went away) drops the in-flight
//!   identity provider call or backend invocation with it

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::FromRequest;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::FutureExt;
use serde_json::Value;

use crate::http::error::GatewayError;
use crate::observability::metrics;
use crate::pool::{BackendConnection, ConnectionPool, PoolError};
use crate::resilience::{is_transient, DeadlineElapsed, RequestDeadline, RetryPolicy};
use crate::routing::matcher::PathParams;
use crate::routing::router::{RouteEntry, RouteTable};
use crate::rpc::RpcCall;
use crate::security::{AuthContext, AuthInterceptor};
use crate::transcode::{to_http_response, to_rpc_request};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Pipeline step a request can be rejected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Routing,
    Authenticating,
    Pooling,
    TranscodingRequest,
    Invoking,
}

/// Everything known about a request once it is routed and authenticated.
#[derive(Debug)]
pub struct ProxyRequest<'a> {
    pub route: &'a RouteEntry,
    pub params: PathParams,
    pub query: Option<String>,
    pub body: Bytes,
    pub auth: AuthContext,
    pub request_id: Option<String>,
}

impl ProxyRequest<'_> {
    /// Metadata forwarded with the backend call.
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        let mut metadata = self.auth.metadata();
        if let Some(id) = &self.request_id {
            metadata.push((REQUEST_ID_HEADER, id.clone()));
        }
        metadata
    }
}

/// Transcoded backend answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Orchestrates route lookup, auth, pooling, transcoding and invocation.
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    auth: Arc<AuthInterceptor>,
    pool: Arc<ConnectionPool>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        auth: Arc<AuthInterceptor>,
        pool: Arc<ConnectionPool>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            routes,
            auth,
            pool,
            retry,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn auth(&self) -> &AuthInterceptor {
        &self.auth
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Handle one HTTP request. Never panics, always produces a response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let mut route_label = String::from("unmatched");

        let outcome = AssertUnwindSafe(self.dispatch(request, &mut route_label))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(response)) => response.into_response(),
            Ok(Err(err)) => err.into_response(),
            Err(panic) => {
                tracing::error!(
                    route = %route_label,
                    panic = %panic_message(&*panic),
                    "Request handler panicked"
                );
                GatewayError::Internal("request handler panicked".to_string()).into_response()
            }
        };

        let status = response.status().as_u16();
        metrics::record_request(method.as_str(), &route_label, status, start);
        tracing::debug!(
            method = %method,
            route = %route_label,
            status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Responded"
        );
        response
    }

    async fn dispatch(
        &self,
        request: Request<Body>,
        route_label: &mut String,
    ) -> Result<ProxyResponse, GatewayError> {
        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_owned);
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let matched = self.routes.match_route(request.method(), &path)?;
        let route = matched.entry;
        *route_label = route.label();

        let auth = self
            .auth
            .authenticate(&path, request.headers(), route.auth)
            .await?;

        let body = Bytes::from_request(request, &())
            .await
            .map_err(|rejection| GatewayError::Body {
                status: rejection.status(),
                message: rejection.body_text(),
            })?;

        let proxy = ProxyRequest {
            route,
            params: matched.params,
            query,
            body,
            auth,
            request_id,
        };
        tracing::debug!(
            route = %route.label(),
            rpc_method = %route.rpc_method,
            authenticated = proxy.auth.is_authenticated(),
            "Dispatching"
        );

        let payload = self.forward(&proxy).await?;

        let (status, body) = to_http_response(route.operation, Ok(payload));
        Ok(ProxyResponse { status, body })
    }

    /// Pooling, request transcoding and invocation, with the retry budget.
    async fn forward(&self, req: &ProxyRequest<'_>) -> Result<Value, GatewayError> {
        let route = req.route;
        let deadline = RequestDeadline::start(route.deadline);
        let mut retries_left = self.retry.budget(route.operation);

        let mut conn = deadline
            .run(self.acquire(route, &mut retries_left))
            .await
            .map_err(|elapsed| timed_out(route, elapsed))??;

        let rpc = to_rpc_request(route, &req.params, req.query.as_deref(), &req.body)?;
        let mut call = RpcCall {
            method: rpc.method,
            message: rpc.message,
            deadline: route.deadline,
            metadata: req.metadata(),
        };

        loop {
            call.deadline = deadline.remaining();
            let outcome = deadline.run(conn.channel().invoke(call.clone())).await;
            match outcome {
                Ok(Ok(value)) => {
                    self.pool.mark_healthy(&conn);
                    self.pool.release(conn);
                    return Ok(value);
                }
                Ok(Err(status)) => {
                    let transient = is_transient(&status);
                    if transient {
                        self.pool.mark_unhealthy(&conn, &status);
                    }
                    self.pool.release(conn);

                    if transient && retries_left > 0 {
                        retries_left -= 1;
                        metrics::record_retry(route.service.as_str());
                        tracing::info!(
                            route = %route.label(),
                            code = ?status.code(),
                            remaining_ms = deadline.remaining().as_millis() as u64,
                            "Retrying idempotent call"
                        );
                        conn = deadline
                            .run(self.acquire(route, &mut retries_left))
                            .await
                            .map_err(|elapsed| timed_out(route, elapsed))??;
                        continue;
                    }
                    return Err(GatewayError::Upstream(status));
                }
                Err(elapsed) => {
                    self.pool.release(conn);
                    return Err(timed_out(route, elapsed));
                }
            }
        }
    }

    /// Acquire, spending the retry budget on a transient `Unavailable`.
    async fn acquire(
        &self,
        route: &RouteEntry,
        retries_left: &mut u32,
    ) -> Result<Arc<BackendConnection>, GatewayError> {
        match self.pool.acquire(route.service).await {
            Err(PoolError::Unavailable { reason, .. }) if *retries_left > 0 => {
                *retries_left -= 1;
                metrics::record_retry(route.service.as_str());
                tracing::info!(
                    service = %route.service,
                    reason = %reason,
                    "Backend unavailable, retrying once"
                );
                Ok(self.pool.acquire(route.service).await?)
            }
            other => Ok(other?),
        }
    }
}

fn timed_out(route: &RouteEntry, elapsed: DeadlineElapsed) -> GatewayError {
    tracing::warn!(route = %route.label(), deadline = ?elapsed.0, "Request deadline exceeded");
    GatewayError::DeadlineExceeded(elapsed.0)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
