//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_gateway::config::GatewayConfig;
use api_gateway::rpc::{ConnectError, Connector, RpcCall, RpcChannel, ServiceEndpoint};
use api_gateway::security::{AuthError, CallerIdentity, TokenVerifier};
use api_gateway::GatewayServer;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tonic::Status;
use tower::ServiceExt;

pub const GOOD_TOKEN: &str = "good-token";

/// Verifier accepting only [`GOOD_TOKEN`], counting every call.
#[derive(Default)]
pub struct FakeVerifier {
    pub calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if token == GOOD_TOKEN {
            Ok(CallerIdentity {
                id: "user-1".into(),
                email: "agent@example.com".into(),
                role: "agent".into(),
            })
        } else {
            Err(AuthError::InvalidOrExpiredToken)
        }
    }
}

/// Backend behaviour shared by every channel the mock connector hands out.
#[derive(Default)]
pub struct MockBackend {
    pub invocations: AtomicUsize,
    pub cancelled: AtomicBool,
    pub started: Notify,
    /// Results returned in order; when empty the call is echoed back.
    script: Mutex<VecDeque<Result<Value, Status>>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<RpcCall>>,
}

impl MockBackend {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn push_result(&self, result: Result<Value, Status>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<RpcCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

/// Flags the backend as cancelled if dropped before the call completes.
struct CancelGuard<'a> {
    backend: &'a MockBackend,
    completed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.backend.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

pub struct MockChannel {
    backend: Arc<MockBackend>,
}

#[async_trait]
impl RpcChannel for MockChannel {
    async fn invoke(&self, call: RpcCall) -> Result<Value, Status> {
        let backend = &self.backend;
        backend.invocations.fetch_add(1, Ordering::SeqCst);
        backend.calls.lock().unwrap().push(call.clone());

        let mut guard = CancelGuard {
            backend,
            completed: false,
        };
        backend.started.notify_one();

        let delay = *backend.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = backend.script.lock().unwrap().pop_front();
        guard.completed = true;
        scripted.unwrap_or_else(|| Ok(json!({ "method": call.method, "request": call.message })))
    }
}

/// Connector counting connect attempts; can refuse the next few.
pub struct MockConnector {
    pub backend: Arc<MockBackend>,
    pub created: AtomicUsize,
    pub connect_delay: Duration,
    refusals: AtomicUsize,
}

impl MockConnector {
    pub fn new(backend: Arc<MockBackend>) -> Self {
        Self {
            backend,
            created: AtomicUsize::new(0),
            connect_delay: Duration::ZERO,
            refusals: AtomicUsize::new(0),
        }
    }

    /// Connect attempts so far, refused ones included.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Refuse the next `n` connect attempts.
    pub fn refuse_next(&self, n: usize) {
        self.refusals.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &ServiceEndpoint) -> Result<Arc<dyn RpcChannel>, ConnectError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ConnectError::new(endpoint, "connection refused"));
        }
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        Ok(Arc::new(MockChannel {
            backend: self.backend.clone(),
        }))
    }
}

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.identity.base_url = "http://identity.test".into();
    config.identity.service_key = "service-key".into();
    config.pool.backoff_base_ms = 1;
    config.pool.backoff_max_ms = 5;
    config
}

/// Everything a test needs to drive and observe the gateway.
pub struct Harness {
    pub router: Router,
    pub server: GatewayServer,
    pub verifier: Arc<FakeVerifier>,
    pub connector: Arc<MockConnector>,
    pub backend: Arc<MockBackend>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(test_config(), Duration::ZERO)
    }

    pub fn with(config: GatewayConfig, connect_delay: Duration) -> Self {
        let verifier = Arc::new(FakeVerifier::default());
        let backend = Arc::new(MockBackend::default());
        let mut connector = MockConnector::new(backend.clone());
        connector.connect_delay = connect_delay;
        let connector = Arc::new(connector);

        let server = GatewayServer::with_components(config, verifier.clone(), connector.clone());
        let router = server.router();
        Self {
            router,
            server,
            verifier,
            connector,
            backend,
        }
    }

    pub fn pool_acquisitions(&self) -> u64 {
        self.server.dispatcher().pool().stats().acquisitions()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        send(self.router.clone(), request).await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}
