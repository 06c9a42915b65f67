//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{
    GatewayConfig, LogFormat, ServiceConfig, DEV_IDENTITY_KEY, DEV_IDENTITY_URL,
};
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::catalog::DOMAINS;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    config.fill_missing_services();
    apply_env_overrides(&mut config, &env)?;
    require_identity(&mut config, &env)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `PORT`, `SUPABASE_*`, `<DOMAIN>_SERVICE_URL` and `GATEWAY_LOG_FORMAT`.
fn apply_env_overrides<F>(config: &mut GatewayConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = non_empty(env("PORT")) {
        match port.parse::<u16>() {
            Ok(port) => config.set_port(port),
            Err(_) => {
                return Err(ConfigError::InvalidEnv {
                    key: "PORT".into(),
                    value: port,
                })
            }
        }
    }

    if let Some(url) = non_empty(env("SUPABASE_URL")) {
        config.identity.base_url = url;
    }
    if let Some(key) = non_empty(env("SUPABASE_KEY")) {
        config.identity.service_key = key;
    }

    for domain in DOMAINS {
        let key = format!("{}_SERVICE_URL", domain.segment.to_uppercase());
        if let Some(address) = non_empty(env(&key)) {
            config
                .services
                .entry(domain.segment.to_string())
                .or_insert_with(|| ServiceConfig::new(""))
                .address = address;
        }
    }

    if let Some(format) = non_empty(env("GATEWAY_LOG_FORMAT")) {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    key: "GATEWAY_LOG_FORMAT".into(),
                    value: format,
                })
            }
        };
    }

    Ok(())
}

/// The identity provider URL and key are mandatory outside development.
///
/// Logging is not initialised yet; the binary warns about placeholders later.
fn require_identity<F>(config: &mut GatewayConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let development = env("GATEWAY_ENV").as_deref() == Some("development");

    if config.identity.base_url.is_empty() {
        if !development {
            return Err(ConfigError::Missing("SUPABASE_URL"));
        }
        config.identity.base_url = DEV_IDENTITY_URL.to_string();
    }
    if config.identity.service_key.is_empty() {
        if !development {
            return Err(ConfigError::Missing("SUPABASE_KEY"));
        }
        config.identity.service_key = DEV_IDENTITY_KEY.to_string();
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
