//! Per-request caller context.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Identity returned by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CallerIdentity {
    /// Subject id.
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

/// Outcome of authentication for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    /// Public route or public path prefix; no token was checked.
    Anonymous,
    Authenticated {
        identity: CallerIdentity,
        /// `exp` claim of the token, when it carries one.
        token_expiry: Option<SystemTime>,
    },
}

impl AuthContext {
    pub fn identity(&self) -> Option<&CallerIdentity> {
        match self {
            AuthContext::Anonymous => None,
            AuthContext::Authenticated { identity, .. } => Some(identity),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthContext::Authenticated { .. })
    }

    /// Caller metadata forwarded to backends.
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        match self.identity() {
            None => Vec::new(),
            Some(identity) => vec![
                ("x-user-id", identity.id.clone()),
                ("x-user-email", identity.email.clone()),
                ("x-user-role", identity.role.clone()),
            ],
        }
    }
}
