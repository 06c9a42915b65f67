//! Reconnect delays.

use std::time::Duration;

use rand::Rng;

use crate::config::PoolConfig;

/// Exponential reconnect schedule with up to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// Delay before reconnect number `failures + 1`: `base * 2^failures`, capped.
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        let capped = self.base.saturating_mul(factor).min(self.max);

        let spread = capped.as_millis() as u64 / 10;
        if spread == 0 {
            return capped;
        }
        capped + Duration::from_millis(rand::thread_rng().gen_range(0..spread))
    }
}
