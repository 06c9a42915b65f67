//! Authentication interceptor.
//!
//! # Algorithm
//! 1. Public path prefix or public route → anonymous context
//! 2. Require `Authorization: Bearer <token>`
//! 3. Cache hit → identity; miss → verify with the identity provider and cache
//!
//! Every route not explicitly public requires a verified caller. Concurrent
//! misses for one token share a single identity provider call; the in-flight
//! entry is dropped as soon as that call finishes, so rejections are never
//! remembered.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::http::{header, HeaderMap};
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::routing::router::AuthRequirement;
use crate::security::context::{AuthContext, CallerIdentity};
use crate::security::identity::TokenVerifier;
use crate::security::token_cache::TokenCache;

/// Authentication failure; always answered with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed bearer token")]
    MissingOrMalformedToken,
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,
}

type Verification = Result<(CallerIdentity, Option<SystemTime>), AuthError>;

/// Validates bearer tokens before any backend resource is touched.
pub struct AuthInterceptor {
    verifier: Arc<dyn TokenVerifier>,
    cache: TokenCache,
    in_flight: DashMap<String, Arc<OnceCell<Verification>>>,
    public_prefixes: Vec<String>,
}

impl AuthInterceptor {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        cache: TokenCache,
        public_prefixes: Vec<String>,
    ) -> Self {
        Self {
            verifier,
            cache,
            in_flight: DashMap::new(),
            public_prefixes,
        }
    }

    pub fn from_config(verifier: Arc<dyn TokenVerifier>, config: &GatewayConfig) -> Self {
        let cache = TokenCache::new(
            Duration::from_secs(config.identity.cache_ttl_secs),
            config.identity.cache_max_entries,
        );
        Self::new(verifier, cache, config.access.public_prefixes.clone())
    }

    /// True if `path` is, or lies under, a configured public prefix.
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            path == prefix
                || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
        })
    }

    /// Produce the caller context for a request.
    pub async fn authenticate(
        &self,
        path: &str,
        headers: &HeaderMap,
        requirement: AuthRequirement,
    ) -> Result<AuthContext, AuthError> {
        if requirement == AuthRequirement::Public || self.is_public_path(path) {
            return Ok(AuthContext::Anonymous);
        }

        let token = bearer_token(headers)?;

        if let Some(hit) = self.cache.get(token) {
            metrics::record_auth_cache("hit");
            return Ok(AuthContext::Authenticated {
                identity: hit.identity,
                token_expiry: hit.token_expiry,
            });
        }
        metrics::record_auth_cache("miss");

        let (identity, token_expiry) = self.verify_once(token).await?;
        Ok(AuthContext::Authenticated {
            identity,
            token_expiry,
        })
    }

    /// Verify `token`, joining a verification already running for it.
    async fn verify_once(&self, token: &str) -> Verification {
        let cell = self.in_flight.entry(token.to_string()).or_default().clone();

        let result = cell
            .get_or_init(|| async {
                let identity = self.verifier.verify(token).await?;
                let token_expiry = self.cache.insert(token, identity.clone());
                tracing::debug!(user_id = %identity.id, role = %identity.role, "Token verified");
                Ok((identity, token_expiry))
            })
            .await
            .clone();

        self.in_flight.remove_if(token, |_, current| Arc::ptr_eq(current, &cell));
        result
    }

    /// Drop a cached verification.
    pub fn invalidate(&self, token: &str) -> bool {
        self.cache.invalidate(token)
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingOrMalformedToken)?
        .to_str()
        .map_err(|_| AuthError::MissingOrMalformedToken)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MissingOrMalformedToken)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(AuthError::MissingOrMalformedToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingVerifier {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingVerifier {
        fn slow(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl TokenVerifier for CountingVerifier {
        async fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if token == "good" {
                Ok(CallerIdentity {
                    id: "u1".into(),
                    email: "u1@example.com".into(),
                    role: "agent".into(),
                })
            } else {
                Err(AuthError::InvalidOrExpiredToken)
            }
        }
    }

    fn interceptor(verifier: Arc<CountingVerifier>) -> AuthInterceptor {
        AuthInterceptor::new(
            verifier,
            TokenCache::new(Duration::from_secs(60), 100),
            vec!["/health".into(), "/api/v1/auth".into()],
        )
    }

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Ok("abc"));
        assert!(bearer_token(&HeaderMap::new()).is_err());
        assert!(bearer_token(&headers("Basic abc")).is_err());
        assert!(bearer_token(&headers("Bearer")).is_err());
        assert!(bearer_token(&headers("Bearer  ")).is_err());
        assert!(bearer_token(&headers("Bearer a b")).is_err());
    }

    #[test]
    fn test_public_prefixes_respect_segments() {
        let auth = interceptor(Arc::default());
        assert!(auth.is_public_path("/health"));
        assert!(auth.is_public_path("/api/v1/auth/login"));
        assert!(!auth.is_public_path("/healthz"));
        assert!(!auth.is_public_path("/api/v1/faq"));
    }

    #[tokio::test]
    async fn test_public_route_skips_verification() {
        let verifier = Arc::new(CountingVerifier::default());
        let auth = interceptor(verifier.clone());
        let ctx = auth
            .authenticate("/api/v1/faq", &HeaderMap::new(), AuthRequirement::Public)
            .await
            .unwrap();
        assert_eq!(ctx, AuthContext::Anonymous);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let auth = interceptor(Arc::default());
        let err = auth
            .authenticate("/api/v1/ticket", &HeaderMap::new(), AuthRequirement::Authenticated)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingOrMalformedToken);
    }

    #[tokio::test]
    async fn test_verification_is_cached() {
        let verifier = Arc::new(CountingVerifier::default());
        let auth = interceptor(verifier.clone());

        for _ in 0..3 {
            let ctx = auth
                .authenticate("/api/v1/ticket", &headers("Bearer good"), AuthRequirement::Authenticated)
                .await
                .unwrap();
            assert_eq!(ctx.identity().map(|i| i.id.as_str()), Some("u1"));
        }
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);

        assert!(auth.invalidate("good"));
        auth.authenticate("/api/v1/ticket", &headers("Bearer good"), AuthRequirement::Authenticated)
            .await
            .unwrap();
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejections_are_not_cached() {
        let verifier = Arc::new(CountingVerifier::default());
        let auth = interceptor(verifier.clone());
        for _ in 0..2 {
            let err = auth
                .authenticate("/api/v1/ticket", &headers("Bearer bad"), AuthRequirement::Authenticated)
                .await
                .unwrap_err();
            assert_eq!(err, AuthError::InvalidOrExpiredToken);
        }
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_verification() {
        let verifier = Arc::new(CountingVerifier::slow(Duration::from_millis(50)));
        let auth = interceptor(verifier.clone());
        let good = headers("Bearer good");

        let (a, b) = tokio::join!(
            auth.authenticate("/api/v1/ticket", &good, AuthRequirement::Authenticated),
            auth.authenticate("/api/v1/ticket", &good, AuthRequirement::Authenticated),
        );

        assert_eq!(a.unwrap().identity().map(|i| i.id.as_str()), Some("u1"));
        assert_eq!(b.unwrap().identity().map(|i| i.id.as_str()), Some("u1"));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
        assert!(auth.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_rejection_is_not_remembered() {
        let verifier = Arc::new(CountingVerifier::slow(Duration::from_millis(50)));
        let auth = interceptor(verifier.clone());
        let bad = headers("Bearer bad");

        let (a, b) = tokio::join!(
            auth.authenticate("/api/v1/ticket", &bad, AuthRequirement::Authenticated),
            auth.authenticate("/api/v1/ticket", &bad, AuthRequirement::Authenticated),
        );
        assert_eq!(a.unwrap_err(), AuthError::InvalidOrExpiredToken);
        assert_eq!(b.unwrap_err(), AuthError::InvalidOrExpiredToken);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);

        let again = auth
            .authenticate("/api/v1/ticket", &bad, AuthRequirement::Authenticated)
            .await;
        assert!(again.is_err());
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 2);
    }
}
