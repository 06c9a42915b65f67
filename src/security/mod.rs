//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (route already matched):
//!     → interceptor.rs (public prefix / public route? → anonymous)
//!     → interceptor.rs (Authorization: Bearer <token>)
//!     → token_cache.rs (hit? → identity)
//!     → identity.rs (identity provider round trip, then cache)
//!     → context.rs (AuthContext for the rest of the request)
//! ```
//!
//! # Design Decisions
//! - Fail closed: anything not explicitly public needs a verified token
//! - The identity provider sits behind a trait so tests need no network

pub mod context;
pub mod identity;
pub mod interceptor;
pub mod token_cache;

pub use context::{AuthContext, CallerIdentity};
pub use identity::{IdentityProviderVerifier, TokenVerifier, VerifierError};
pub use interceptor::{bearer_token, AuthError, AuthInterceptor};
pub use token_cache::TokenCache;
