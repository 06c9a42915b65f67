//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the route table, auth interceptor, pool and dispatcher from config
//! - Create the Axum router: `/health` plus a fallback into the dispatcher
//! - Wire up middleware (request ID, tracing, body limit, CORS)
//! - Serve with graceful shutdown bounded by a grace period

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::dispatcher::Dispatcher;
use crate::lifecycle::ShutdownListener;
use crate::pool::ConnectionPool;
use crate::resilience::RetryPolicy;
use crate::routing::catalog::DOMAINS;
use crate::routing::router::{RoutePolicy, RouteTable};
use crate::rpc::{Connector, GrpcConnector};
use crate::security::{AuthInterceptor, IdentityProviderVerifier, TokenVerifier, VerifierError};

/// HTTP front of the gateway.
pub struct GatewayServer {
    config: Arc<GatewayConfig>,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayServer {
    /// Build the server with the real identity provider and gRPC connector.
    pub fn new(config: GatewayConfig) -> Result<Self, VerifierError> {
        let verifier = Arc::new(IdentityProviderVerifier::new(&config.identity)?);
        let connector = Arc::new(GrpcConnector::new(Duration::from_secs(
            config.timeouts.connect_secs,
        )));
        Ok(Self::with_components(config, verifier, connector))
    }

    /// Build the server around the given verifier and connector.
    pub fn with_components(
        config: GatewayConfig,
        verifier: Arc<dyn TokenVerifier>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let routes = Arc::new(RouteTable::from_catalog(
            DOMAINS,
            &RoutePolicy::from_config(&config),
        ));
        let auth = Arc::new(AuthInterceptor::from_config(verifier, &config));
        let pool = Arc::new(ConnectionPool::from_config(&config, connector));
        let dispatcher = Arc::new(Dispatcher::new(routes, auth, pool, RetryPolicy::default()));

        tracing::debug!(routes = dispatcher.routes().len(), "Route table built");

        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.listener.max_body_bytes));

        let router = Router::new()
            .route("/health", get(health_handler))
            .fallback(gateway_handler)
            .with_state(self.dispatcher.clone())
            .layer(middleware);

        if self.config.listener.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Serve until `shutdown` fires, then give in-flight requests the grace period.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        tracing::info!(address = %addr, routes = self.dispatcher.routes().len(), "HTTP server starting");

        let (draining_tx, draining_rx) = oneshot::channel();
        let server = axum::serve(listener, self.router().into_make_service())
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Stopped accepting connections, draining");
                let _ = draining_tx.send(());
            })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => result?,
            _ = draining_rx => {
                match tokio::time::timeout(grace, &mut server).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!(
                        grace_secs = grace.as_secs(),
                        "Grace period elapsed, abandoning in-flight requests"
                    ),
                }
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Liveness probe; always public, always 200.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn gateway_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request<Body>,
) -> Response {
    dispatcher.handle(request).await
}
