//! Token verification cache.
//!
//! # Responsibilities
//! - Remember successful verifications keyed by token
//! - Expire entries at min(configured TTL, token `exp`)
//! - Bound the number of entries; support explicit invalidation
//!
//! # Design Decisions
//! - `DashMap` shards the map so hits never contend on a global lock
//! - A slot is reserved on an atomic counter before inserting, so the bound
//!   holds under concurrent inserts
//! - Failed verifications are never cached

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::security::context::CallerIdentity;

#[derive(Debug, Clone)]
struct CachedVerification {
    identity: CallerIdentity,
    token_expiry: Option<SystemTime>,
    expires_at: Instant,
}

/// Successful verification, as returned from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub identity: CallerIdentity,
    pub token_expiry: Option<SystemTime>,
}

/// Bounded TTL cache of verified tokens.
#[derive(Debug)]
pub struct TokenCache {
    entries: DashMap<String, CachedVerification>,
    /// Reserved slots; never exceeds `max_entries`.
    occupied: AtomicUsize,
    ttl: Duration,
    max_entries: usize,
}

impl TokenCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            occupied: AtomicUsize::new(0),
            ttl,
            max_entries,
        }
    }

    /// Cached identity for `token`, if still fresh.
    pub fn get(&self, token: &str) -> Option<CacheHit> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(token) {
            if entry.expires_at > now {
                return Some(CacheHit {
                    identity: entry.identity.clone(),
                    token_expiry: entry.token_expiry,
                });
            }
        }
        if self.entries.remove_if(token, |_, e| e.expires_at <= now).is_some() {
            self.free_slots(1);
        }
        None
    }

    /// Cache a successful verification. Returns the token's `exp`, if any.
    pub fn insert(&self, token: &str, identity: CallerIdentity) -> Option<SystemTime> {
        let token_expiry = jwt_expiry(token);
        let mut ttl = self.ttl;
        if let Some(exp) = token_expiry {
            match exp.duration_since(SystemTime::now()) {
                Ok(left) => ttl = ttl.min(left),
                Err(_) => return token_expiry,
            }
        }
        if ttl.is_zero() || self.max_entries == 0 {
            return token_expiry;
        }

        if !self.reserve_slot() {
            self.sweep_expired();
            if !self.reserve_slot() {
                tracing::debug!(entries = self.max_entries, "Token cache full, not caching");
                return token_expiry;
            }
        }

        let entry = CachedVerification {
            identity,
            token_expiry,
            expires_at: Instant::now() + ttl,
        };
        match self.entries.entry(token.to_string()) {
            Entry::Occupied(mut existing) => {
                existing.insert(entry);
                self.free_slots(1);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
        token_expiry
    }

    fn reserve_slot(&self) -> bool {
        self.occupied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_entries).then_some(n + 1)
            })
            .is_ok()
    }

    fn free_slots(&self, n: usize) {
        self.occupied.fetch_sub(n, Ordering::AcqRel);
    }

    /// Forget a token (e.g. after logout).
    pub fn invalidate(&self, token: &str) -> bool {
        let removed = self.entries.remove(token).is_some();
        if removed {
            self.free_slots(1);
        }
        removed
    }

    /// Drop every expired entry.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let fresh = e.expires_at > now;
            if !fresh {
                removed += 1;
            }
            fresh
        });
        if removed > 0 {
            self.free_slots(removed);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `exp` claim of a JWT, without verifying the signature.
pub fn jwt_expiry(token: &str) -> Option<SystemTime> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_u64()?;
    Some(UNIX_EPOCH + Duration::from_secs(exp))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> CallerIdentity {
        CallerIdentity {
            id: id.into(),
            email: format!("{}@example.com", id),
            role: "authenticated".into(),
        }
    }

    fn jwt_with_exp(exp: u64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{}}}"#, exp));
        format!("{}.{}.sig", header, claims)
    }

    fn unix_now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    #[test]
    fn test_hit_and_invalidate() {
        let cache = TokenCache::new(Duration::from_secs(60), 10);
        assert!(cache.get("opaque").is_none());

        cache.insert("opaque", identity("u1"));
        let hit = cache.get("opaque").unwrap();
        assert_eq!(hit.identity.id, "u1");
        assert_eq!(hit.token_expiry, None);

        assert!(cache.invalidate("opaque"));
        assert!(cache.get("opaque").is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = TokenCache::new(Duration::from_millis(20), 10);
        cache.insert("opaque", identity("u1"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("opaque").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_jwt_exp_bounds_ttl() {
        let token = jwt_with_exp(unix_now() + 3600);
        assert!(jwt_expiry(&token).is_some());

        let cache = TokenCache::new(Duration::from_secs(60), 10);
        let expiry = cache.insert(&token, identity("u1"));
        assert_eq!(expiry, jwt_expiry(&token));
        assert!(cache.get(&token).is_some());

        // Already expired tokens are never cached.
        let stale = jwt_with_exp(unix_now() - 10);
        cache.insert(&stale, identity("u2"));
        assert!(cache.get(&stale).is_none());
    }

    #[test]
    fn test_bounded() {
        let cache = TokenCache::new(Duration::from_secs(60), 2);
        cache.insert("a", identity("a"));
        cache.insert("b", identity("b"));
        cache.insert("c", identity("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("c").is_none());
    }

    #[test]
    fn test_reinsert_does_not_use_a_slot() {
        let cache = TokenCache::new(Duration::from_secs(60), 2);
        cache.insert("a", identity("a"));
        cache.insert("a", identity("a2"));
        cache.insert("b", identity("b"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().identity.id, "a2");

        assert!(cache.invalidate("a"));
        cache.insert("c", identity("c"));
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_bound_holds_under_concurrent_inserts() {
        let cache = std::sync::Arc::new(TokenCache::new(Duration::from_secs(60), 8));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.insert(&format!("tok-{}-{}", t, i), identity("u"));
                        assert!(cache.len() <= 8);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn test_non_jwt_has_no_expiry() {
        assert_eq!(jwt_expiry("not-a-jwt"), None);
        assert_eq!(jwt_expiry("a.%%%.c"), None);
    }
}
