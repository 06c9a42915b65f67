//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → optional TOML file (loader.rs)
//!     → environment overrides (PORT, SUPABASE_*, <DOMAIN>_SERVICE_URL)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_with, ConfigError};
pub use schema::{
    AccessConfig, GatewayConfig, IdentityConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    PoolConfig, ServiceConfig, TimeoutConfig, DEV_IDENTITY_KEY, DEV_IDENTITY_URL,
};
pub use validation::{validate_config, ValidationError};
