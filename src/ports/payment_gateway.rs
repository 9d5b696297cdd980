//! Payment gateway port.
//!
//! The booking core only needs three things from a gateway: open a hosted
//! checkout for an amount, read a checkout session back, and refund part or
//! all of a captured payment.
//!
//! # Design
//!
//! - **Minor units**: every amount is an `i64` in the currency's minor unit
//! - **Credentials are configuration**: adapters receive keys at construction
//! - **Reads are retryable**: `get_session` is safe to call repeatedly

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingError;
use crate::domain::foundation::{Currency, EventId, Money, ReservationId, Timestamp, UserId};

/// Port for the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted checkout session for a one-off payment.
    async fn open_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentError>;

    /// Reads a checkout session's payment state.
    async fn get_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError>;

    /// Refunds `amount` of a captured payment. Returns the gateway's refund id.
    async fn refund(&self, payment_reference: &str, amount: Money) -> Result<String, PaymentError>;
}

/// Typed metadata attached to a checkout so the gateway dashboard can be
/// traced back to the reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub reservation_id: ReservationId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub quantity: u32,
    /// Set for quantity top-ups: the quantity the reservation will hold once paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_quantity: Option<u32>,
}

impl CheckoutMetadata {
    /// Flattens into key/value pairs for form-encoded gateways.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("reservation_id", self.reservation_id.to_string()),
            ("user_id", self.user_id.to_string()),
            ("quantity", self.quantity.to_string()),
        ];
        if let Some(event_id) = self.event_id {
            pairs.push(("event_id", event_id.to_string()));
        }
        if let Some(target) = self.target_quantity {
            pairs.push(("target_quantity", target.to_string()));
        }
        pairs
    }
}

/// Request to open a checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub amount: Money,
    pub currency: Currency,
    pub line_item_description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: CheckoutMetadata,
}

/// A hosted checkout the payer is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub expires_at: Timestamp,
}

/// What the gateway currently reports for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub paid: bool,
    /// Total charged, minor units.
    pub amount_total: i64,
    /// Payment id used for refunds; present once paid.
    pub payment_reference: Option<String>,
}

/// Errors from payment gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn refund_rejected(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::RefundRejected, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for BookingError {
    fn from(err: PaymentError) -> Self {
        if err.retryable {
            BookingError::GatewayTransient(err.to_string())
        } else {
            BookingError::GatewayFatal(err.to_string())
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue or timeout.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Session or payment not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Refund refused (already refunded, amount too large, ...).
    RefundRejected,

    /// Request rejected as malformed.
    InvalidRequest,

    /// Provider API error.
    ProviderError,

    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::RefundRejected => "refund_rejected",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
