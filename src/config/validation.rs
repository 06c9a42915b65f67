//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (services and public domains exist in the catalog)
//! - Validate value ranges (timeouts > 0, backoff base <= cap)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::catalog::{find_domain, DOMAINS};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error("invalid identity provider URL '{0}'")]
    IdentityUrl(String),
    #[error("unknown service domain '{0}'")]
    UnknownDomain(String),
    #[error("no backend address configured for '{0}'")]
    MissingService(String),
    #[error("invalid address '{address}' for service '{domain}'")]
    ServiceAddress { domain: String, address: String },
    #[error("{0} must be greater than zero")]
    ZeroValue(String),
    #[error("pool.backoff_base_ms ({base}) exceeds pool.backoff_max_ms ({max})")]
    BackoffRange { base: u64, max: u64 },
    #[error("public prefix '{0}' must start with '/'")]
    PublicPrefix(String),
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_body_bytes".into()));
    }

    if Url::parse(&config.identity.base_url).is_err() {
        errors.push(ValidationError::IdentityUrl(config.identity.base_url.clone()));
    }
    if config.identity.timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("identity.timeout_secs".into()));
    }

    for (domain, service) in &config.services {
        if find_domain(domain).is_none() {
            errors.push(ValidationError::UnknownDomain(domain.clone()));
        }
        let valid = Url::parse(&service.uri())
            .map(|u| u.host_str().is_some())
            .unwrap_or(false);
        if service.address.trim().is_empty() || !valid {
            errors.push(ValidationError::ServiceAddress {
                domain: domain.clone(),
                address: service.address.clone(),
            });
        }
        if service.timeout_ms == Some(0) {
            errors.push(ValidationError::ZeroValue(format!("services.{}.timeout_ms", domain)));
        }
    }
    for domain in DOMAINS {
        if !config.services.contains_key(domain.segment) {
            errors.push(ValidationError::MissingService(domain.segment.to_string()));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.connect_secs".into()));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_secs".into()));
    }

    if config.pool.backoff_base_ms > config.pool.backoff_max_ms {
        errors.push(ValidationError::BackoffRange {
            base: config.pool.backoff_base_ms,
            max: config.pool.backoff_max_ms,
        });
    }
    if config.pool.failure_threshold == 0 {
        errors.push(ValidationError::ZeroValue("pool.failure_threshold".into()));
    }

    for prefix in &config.access.public_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::PublicPrefix(prefix.clone()));
        }
    }
    for domain in &config.access.public_read_domains {
        if find_domain(domain).is_none() {
            errors.push(ValidationError::UnknownDomain(domain.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServiceConfig;

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.identity.base_url = "https://id.example.com".into();
        config.identity.service_key = "key".into();
        config
    }

    #[test]
    fn test_defaults_with_identity_are_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = valid();
        config.listener.bind_address = "nope".into();
        config.services.insert("billing".into(), ServiceConfig::new("localhost:1"));
        config.services.remove("faq");
        config.pool.backoff_base_ms = 5000;
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("nope".into())));
        assert!(errors.contains(&ValidationError::UnknownDomain("billing".into())));
        assert!(errors.contains(&ValidationError::MissingService("faq".into())));
        assert!(errors.contains(&ValidationError::BackoffRange { base: 5000, max: 2000 }));
        assert!(errors.contains(&ValidationError::ZeroValue("timeouts.request_secs".into())));
    }

    #[test]
    fn test_rejects_missing_identity_url() {
        let config = GatewayConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::IdentityUrl(String::new())]);
    }

    #[test]
    fn test_rejects_bad_service_address() {
        let mut config = valid();
        config.services.insert("ticket".into(), ServiceConfig::new(""));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ServiceAddress {
                domain: "ticket".into(),
                address: String::new(),
            }]
        );
    }
}
