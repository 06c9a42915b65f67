//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::catalog::DOMAINS;

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, limits, shutdown grace).
    pub listener: ListenerConfig,

    /// External identity provider used to verify bearer tokens.
    pub identity: IdentityConfig,

    /// Backend RPC service addresses keyed by domain.
    pub services: BTreeMap<String, ServiceConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Backend connection pool policy.
    pub pool: PoolConfig,

    /// Public-route policy.
    pub access: AccessConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            identity: IdentityConfig::default(),
            services: default_services(),
            timeouts: TimeoutConfig::default(),
            pool: PoolConfig::default(),
            access: AccessConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Add the default address for every domain the config does not mention.
    pub fn fill_missing_services(&mut self) {
        for (domain, service) in default_services() {
            self.services.entry(domain).or_insert(service);
        }
    }

    /// Replace the port of the bind address, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        self.listener.bind_address = format!("{}:{}", host, port);
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Grace period for in-flight requests after a shutdown signal.
    pub shutdown_grace_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Allow cross-origin requests from any origin.
    pub cors_permissive: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            shutdown_grace_secs: 5,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            cors_permissive: true,
        }
    }
}

/// Identity provider URL substituted in development when none is configured.
pub const DEV_IDENTITY_URL: &str = "http://localhost:54321";

/// Service key substituted in development when none is configured.
pub const DEV_IDENTITY_KEY: &str = "dev-SUPABASE_KEY-value";

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL; tokens are verified at `{base_url}/auth/v1/user`.
    pub base_url: String,

    /// Service credential sent as the `apikey` header.
    pub service_key: String,

    /// Verification request timeout in seconds.
    pub timeout_secs: u64,

    /// How long a successful verification is reused.
    pub cache_ttl_secs: u64,

    /// Upper bound on cached verifications.
    pub cache_max_entries: usize,
}

impl IdentityConfig {
    /// True when either development placeholder is in use.
    pub fn uses_placeholders(&self) -> bool {
        self.base_url == DEV_IDENTITY_URL || self.service_key == DEV_IDENTITY_KEY
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            service_key: String::new(),
            timeout_secs: 10,
            cache_ttl_secs: 60,
            cache_max_entries: 10_000,
        }
    }
}

/// One backend RPC service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Network address, with or without `http://` (e.g., "localhost:50051").
    pub address: String,

    /// Per-call deadline override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ServiceConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout_ms: None,
        }
    }

    /// Address as a URI; bare `host:port` means plaintext HTTP/2.
    pub fn uri(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("http://{}", self.address)
        }
    }
}

/// Default backend address for each domain: localhost:50051 onwards.
pub fn default_services() -> BTreeMap<String, ServiceConfig> {
    DOMAINS
        .iter()
        .enumerate()
        .map(|(i, d)| {
            (
                d.segment.to_string(),
                ServiceConfig::new(format!("localhost:{}", 50051 + i)),
            )
        })
        .collect()
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Default deadline for one backend call in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 10,
        }
    }
}

/// Backend connection pool policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Base delay for reconnect backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum reconnect backoff in milliseconds.
    pub backoff_max_ms: u64,

    /// Failures within `failure_window_ms` that trip the cool-down.
    pub failure_threshold: u32,

    /// Window in which failures are counted.
    pub failure_window_ms: u64,

    /// How long acquisitions fail fast once tripped.
    pub cooldown_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 100,
            backoff_max_ms: 2000,
            failure_threshold: 3,
            failure_window_ms: 2000,
            cooldown_ms: 5000,
        }
    }
}

/// Which requests skip token verification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Path prefixes that never require a token.
    pub public_prefixes: Vec<String>,

    /// Domains whose list/search/get routes are public.
    pub public_read_domains: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            public_prefixes: vec!["/health".to_string(), "/api/v1/auth".to_string()],
            public_read_domains: vec!["faq".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "api_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
