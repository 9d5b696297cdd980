//! Booking error taxonomy.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | Conflict (InvalidState) | 400 |
//! | Conflict (other kinds) | 409 |
//! | Forbidden | 403 |
//! | NotFound | 404 |
//! | GatewayTransient | 402 |
//! | AmountMismatch | 400 |
//! | GatewayFatal | 502 |
//! | InvariantViolation | 500 |
//! | Infrastructure | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, Money, ValidationError};

/// What kind of conflict stopped the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    SlotAlreadyBooked,
    RefundAlreadyRequested,
    InsufficientCapacity,
    /// Reservation or refund is not in the state the operation needs.
    InvalidState,
    TopUpOutstanding,
}

impl ConflictKind {
    pub fn code(&self) -> &'static str {
        match self {
            ConflictKind::SlotAlreadyBooked => "SLOT_ALREADY_BOOKED",
            ConflictKind::RefundAlreadyRequested => "REFUND_ALREADY_REQUESTED",
            ConflictKind::InsufficientCapacity => "INSUFFICIENT_CAPACITY",
            ConflictKind::InvalidState => "INVALID_STATE",
            ConflictKind::TopUpOutstanding => "TOP_UP_OUTSTANDING",
        }
    }
}

/// Errors returned by booking operations. Every variant aborts the enclosing transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    /// Malformed or missing input; never retried.
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{message}")]
    Conflict { kind: ConflictKind, message: String },

    /// Authenticated caller does not own the reservation.
    #[error("{0}")]
    Forbidden(String),

    /// Missing or not owned by the caller; the two are deliberately indistinguishable.
    #[error("{0}")]
    NotFound(String),

    /// Gateway has not (yet) reported the payment after bounded retries.
    #[error("Payment not completed: {0}")]
    GatewayTransient(String),

    /// Gateway reported a total that differs from what we expect to be paid.
    #[error("Payment amount mismatch: expected {expected}, gateway reported {actual}")]
    AmountMismatch { expected: Money, actual: i64 },

    /// Gateway rejected the operation; message is the gateway's own.
    #[error("Payment gateway error: {0}")]
    GatewayFatal(String),

    /// Stored state disagrees with itself; the operation was aborted.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl BookingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BookingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(kind: ConflictKind, message: impl Into<String>) -> Self {
        BookingError::Conflict {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::conflict(ConflictKind::InvalidState, message)
    }

    pub fn not_found(what: &str) -> Self {
        BookingError::NotFound(format!("{} not found", what))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        BookingError::Forbidden(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BookingError::Infrastructure(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        BookingError::InvariantViolation(message.into())
    }

    /// Stable machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation { .. } => "VALIDATION_FAILED",
            BookingError::Conflict { kind, .. } => kind.code(),
            BookingError::Forbidden(_) => "FORBIDDEN",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::GatewayTransient(_) => "PAYMENT_NOT_COMPLETED",
            BookingError::AmountMismatch { .. } => "PAYMENT_AMOUNT_MISMATCH",
            BookingError::GatewayFatal(_) => "PAYMENT_GATEWAY_ERROR",
            BookingError::InvariantViolation(_) => "INTERNAL_ERROR",
            BookingError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show the caller. Server faults stay generic; gateway
    /// rejections carry the gateway's own message.
    pub fn public_message(&self) -> String {
        match self {
            BookingError::GatewayTransient(_) => "Payment not completed".to_string(),
            BookingError::AmountMismatch { .. } => {
                "Payment amount does not match the reservation".to_string()
            }
            BookingError::GatewayFatal(message) => {
                format!("Payment provider request failed: {}", message)
            }
            BookingError::InvariantViolation(_) | BookingError::Infrastructure(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    /// True for errors the caller might succeed with by retrying later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::GatewayTransient(_) | BookingError::Infrastructure(_)
        )
    }
}

impl From<ValidationError> for BookingError {
    fn from(err: ValidationError) -> Self {
        BookingError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for BookingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => BookingError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "request".to_string()),
                message: err.message,
            },
            ErrorCode::ReservationNotFound => BookingError::not_found("Reservation"),
            ErrorCode::EventNotFound => BookingError::not_found("Event"),
            ErrorCode::RefundNotFound => BookingError::not_found("Refund"),
            ErrorCode::SlotAlreadyBooked => {
                BookingError::conflict(ConflictKind::SlotAlreadyBooked, "Slot already booked")
            }
            ErrorCode::RefundAlreadyRequested => BookingError::conflict(
                ConflictKind::RefundAlreadyRequested,
                "A refund has already been requested for this reservation",
            ),
            ErrorCode::InvalidStateTransition => BookingError::invalid_state(err.message),
            ErrorCode::ExternalServiceError => BookingError::GatewayFatal(err.message),
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                BookingError::Infrastructure(err.message)
            }
        }
    }
}
