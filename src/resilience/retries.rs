//! Retry logic.
//!
//! # Responsibilities
//! - Classify backend failures as transient or terminal
//! - Decide whether an operation gets its single transparent retry
//!
//! # Design Decisions
//! - Never retry create/update/delete (non-idempotent)
//! - One retry at most; the reconnect backoff already spaces attempts out

use tonic::{Code, Status};

use crate::routing::catalog::Operation;

/// Failures that say nothing about the request itself, only the transport.
pub fn is_transient(status: &Status) -> bool {
    status.code() == Code::Unavailable
}

/// Retry budget per request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts granted to idempotent operations.
    pub idempotent_retries: u32,
}

impl RetryPolicy {
    /// Number of transparent retries `op` may use.
    pub fn budget(&self, op: Operation) -> u32 {
        if op.is_idempotent() {
            self.idempotent_retries
        } else {
            0
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { idempotent_retries: 1 }
    }
}
