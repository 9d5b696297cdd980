//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for Stripe, including:
//! - One-off Checkout Sessions
//! - Session retrieval for payment confirmation
//! - Partial and full refunds
//!
//! # Configuration
//!
//! The secret API key is injected from configuration (`BOOKING__PAYMENT__STRIPE_API_KEY`)
//! and held as a `secrecy::SecretString`.

mod mock_payment_gateway;
mod stripe_gateway;
mod stripe_types;

pub use mock_payment_gateway::{MethodCall, MockPaymentGateway};
pub use stripe_gateway::{StripeConfig, StripePaymentGateway};
pub use stripe_types::{StripeCheckoutSession, StripeErrorBody, StripeRefund};
