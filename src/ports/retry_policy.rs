//! RetryPolicy port - bounded polling of eventually-visible gateway state.
//!
//! Used right after the payer returns from the hosted checkout, when the
//! gateway may not yet report the session as paid. Attempts are bounded and
//! spaced by a fixed delay; there is no backoff and no cancellation.

use async_trait::async_trait;
use std::time::Duration;

/// Configuration for a fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    ///
    /// Default: 3
    pub max_attempts: u32,

    /// Pause between attempts.
    ///
    /// Default: 2 seconds
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// No pause between attempts; used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Port deciding how many times to try and how long to wait in between.
#[async_trait]
pub trait RetryPolicy: Send + Sync {
    /// Total attempts allowed, at least 1.
    fn max_attempts(&self) -> u32;

    /// Waits before attempt number `next_attempt` (2-based: the first retry is attempt 2).
    async fn pause(&self, next_attempt: u32);
}
