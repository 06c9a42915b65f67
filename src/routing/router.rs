//! Route lookup.
//!
//! # Responsibilities
//! - Store the compiled route entries
//! - Look up the entry for a (verb, path) pair
//! - Return the matched entry or an explicit not-found
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan; literal segments win over variable segments, then
//!   declaration order decides

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use axum::http::Method;

use crate::config::GatewayConfig;
use crate::routing::catalog::{DomainDescriptor, Operation, ServiceId};
use crate::routing::matcher::{PathParams, PathPattern};

/// Whether a route needs a verified caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    Public,
    Authenticated,
}

/// One (verb, pattern) → RPC method mapping.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: PathPattern,
    pub service: ServiceId,
    /// Fully-qualified method, `package.Service/Method`.
    pub rpc_method: String,
    pub operation: Operation,
    pub auth: AuthRequirement,
    /// How long the backend may take to answer.
    pub deadline: Duration,
    pub domain: &'static DomainDescriptor,
}

impl RouteEntry {
    /// Short label for logs and metrics, e.g. `ticket.list`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.service, self.operation.as_str())
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: PathParams,
}

/// No entry matched the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no route for {method} {path}")]
pub struct RouteNotFound {
    pub method: Method,
    pub path: String,
}

/// Per-deployment knobs applied while generating routes.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// Domains whose list/search/get routes are public.
    pub public_read_domains: Vec<String>,
    pub default_deadline: Duration,
    pub deadline_overrides: HashMap<String, Duration>,
}

impl RoutePolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let deadline_overrides = config
            .services
            .iter()
            .filter_map(|(domain, svc)| {
                svc.timeout_ms
                    .map(|ms| (domain.clone(), Duration::from_millis(ms)))
            })
            .collect();

        Self {
            public_read_domains: config.access.public_read_domains.clone(),
            default_deadline: Duration::from_secs(config.timeouts.request_secs),
            deadline_overrides,
        }
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            public_read_domains: vec!["faq".to_string()],
            default_deadline: Duration::from_secs(10),
            deadline_overrides: HashMap::new(),
        }
    }
}

/// Read-only, ordered route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Generate the CRUD + search routes of every domain.
    pub fn from_catalog(domains: &'static [DomainDescriptor], policy: &RoutePolicy) -> Self {
        let mut entries = Vec::with_capacity(domains.len() * Operation::ALL.len());

        for domain in domains {
            let public_reads = policy
                .public_read_domains
                .iter()
                .any(|d| d == domain.segment);
            let deadline = policy
                .deadline_overrides
                .get(domain.segment)
                .copied()
                .unwrap_or(policy.default_deadline);

            for op in Operation::ALL {
                let auth = if public_reads && op.is_idempotent() {
                    AuthRequirement::Public
                } else {
                    AuthRequirement::Authenticated
                };

                entries.push(RouteEntry {
                    method: op.http_method(),
                    pattern: PathPattern::parse(&format!("{}{}", domain.base_path(), op.path_suffix())),
                    service: domain.service_id(),
                    rpc_method: domain.rpc_method(op),
                    operation: op,
                    auth,
                    deadline,
                    domain,
                });
            }
        }

        Self { entries }
    }

    /// Find the entry serving `method` on `path`.
    pub fn match_route(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, RouteNotFound> {
        let mut best: Option<RouteMatch<'_>> = None;

        for entry in self.entries.iter().filter(|e| e.method == *method) {
            let Some(params) = entry.pattern.matches(path) else {
                continue;
            };
            let replace = match &best {
                None => true,
                Some(current) => entry.pattern.is_more_specific_than(&current.entry.pattern),
            };
            if replace {
                best = Some(RouteMatch { entry, params });
            }
        }

        best.ok_or_else(|| RouteNotFound {
            method: method.clone(),
            path: path.to_string(),
        })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct service identifiers referenced by the table.
    pub fn services(&self) -> Vec<ServiceId> {
        let mut services: Vec<ServiceId> = self.entries.iter().map(|e| e.service).collect();
        services.sort();
        services.dedup();
        services
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{:<7} {:<28} -> {} ({:?})",
                entry.method.as_str(),
                entry.pattern.as_str(),
                entry.rpc_method,
                entry.auth
            )?;
        }
        Ok(())
    }
}
