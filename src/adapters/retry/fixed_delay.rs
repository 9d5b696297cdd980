//! Fixed-delay retry policy backed by the tokio timer.

use async_trait::async_trait;

use crate::ports::{RetryConfig, RetryPolicy};

/// Tries up to `max_attempts` times, sleeping `delay` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayRetry {
    config: RetryConfig,
}

impl FixedDelayRetry {
    /// At least one attempt is always made.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: RetryConfig {
                max_attempts: config.max_attempts.max(1),
                delay: config.delay,
            },
        }
    }

    pub fn config(&self) -> RetryConfig {
        self.config
    }
}

impl Default for FixedDelayRetry {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[async_trait]
impl RetryPolicy for FixedDelayRetry {
    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    async fn pause(&self, next_attempt: u32) {
        tracing::debug!(
            next_attempt,
            max_attempts = self.config.max_attempts,
            delay_ms = self.config.delay.as_millis() as u64,
            "Waiting before retry"
        );
        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }
    }
}
