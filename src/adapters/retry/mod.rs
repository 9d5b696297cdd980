//! Retry policy adapters.

mod fixed_delay;

pub use fixed_delay::FixedDelayRetry;
