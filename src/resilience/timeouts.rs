//! Timeout enforcement.
//!
//! One deadline covers a whole request: pool acquisition, reconnect backoff
//! and every invocation attempt. Dropping the wrapped future on expiry
//! cancels the in-flight call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// The deadline passed before the wrapped call finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineElapsed(pub Duration);

/// Absolute deadline of one request.
#[derive(Debug, Clone, Copy)]
pub struct RequestDeadline {
    budget: Duration,
    at: Instant,
}

impl RequestDeadline {
    /// Start the clock now.
    pub fn start(budget: Duration) -> Self {
        Self {
            budget,
            at: Instant::now() + budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left; zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Run `fut` under whatever is left of the deadline.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DeadlineElapsed>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| DeadlineElapsed(self.budget))
    }
}
