//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid {field} URL template: {reason}")]
    InvalidCheckoutUrl { field: &'static str, reason: &'static str },

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Retry attempts must be between 1 and 10")]
    InvalidRetryAttempts,

    #[error("Checkout expiry must be between 30 and 1440 minutes")]
    InvalidCheckoutExpiry,

    #[error("Abandoned-checkout sweep settings must be positive and outlast the checkout expiry")]
    InvalidSweep,

    #[error("Invalid {kind} refund policy: {reason}")]
    InvalidRefundPolicy { kind: &'static str, reason: String },
}
