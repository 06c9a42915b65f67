//! Token verification against the external identity provider.
//!
//! # Protocol
//! ```text
//! GET {base_url}/auth/v1/user
//!     Authorization: Bearer <token>
//!     apikey: <service key>
//! 2xx → {"id": ..., "email": ..., "role": ...}
//! otherwise → token rejected
//! ```

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::IdentityConfig;
use crate::security::context::CallerIdentity;
use crate::security::interceptor::AuthError;

/// Capability to turn a bearer token into a caller identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError>;
}

/// Verifier setup failure.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("invalid identity provider URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Calls the identity provider's user endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct IdentityProviderVerifier {
    client: reqwest::Client,
    user_url: Url,
    service_key: String,
}

impl IdentityProviderVerifier {
    pub fn new(config: &IdentityConfig) -> Result<Self, VerifierError> {
        let user_url = Url::parse(&format!(
            "{}/auth/v1/user",
            config.base_url.trim_end_matches('/')
        ))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            user_url,
            service_key: config.service_key.clone(),
        })
    }

    pub fn user_url(&self) -> &Url {
        &self.user_url
    }
}

#[async_trait]
impl TokenVerifier for IdentityProviderVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let response = self
            .client
            .get(self.user_url.clone())
            .bearer_auth(token)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Identity provider unreachable");
                AuthError::InvalidOrExpiredToken
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Identity provider rejected token");
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let identity: CallerIdentity = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Unexpected identity provider response");
            AuthError::InvalidOrExpiredToken
        })?;
        if identity.id.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        Ok(identity)
    }
}
