//! HTTP DTOs (Data Transfer Objects) for booking endpoints.
//!
//! These types define the JSON request/response structure for the booking API.
//! They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::domain::booking::{
    PaymentStatus, RefundRecord, RefundRecordStatus, RefundStatus, Reservation, ReservationKind,
    ReservationStatus, ReviewDecision, SlotDescriptor,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to book a provider slot.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub provider_id: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Start time, `HH:MM`.
    pub time: String,
    /// Fee in minor units.
    pub fee: i64,
    /// ISO currency code; the configured default when omitted.
    #[serde(default)]
    pub currency: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Request to register for a ticketed event.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRegistrationRequest {
    pub event_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub name: String,
    pub email: String,
    pub phone: String,
}

fn default_quantity() -> u32 {
    1
}

/// Returned checkout handle to reconcile.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelReservationRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

/// Admin decision on a refund record.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRefundRequest {
    pub decision: ReviewDecision,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response for a newly created reservation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateReservationResponse {
    pub reservation_id: String,
    pub checkout_url: String,
    /// When the checkout session expires (ISO 8601).
    pub checkout_expires_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotResponse {
    pub provider_id: String,
    pub date: String,
    pub time: String,
}

impl From<&SlotDescriptor> for SlotResponse {
    fn from(slot: &SlotDescriptor) -> Self {
        Self {
            provider_id: slot.provider_id.to_string(),
            date: slot.date.format("%Y-%m-%d").to_string(),
            time: slot.time.format("%H:%M").to_string(),
        }
    }
}

/// Success payload of payment confirmation. Identical on repeated calls.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmPaymentResponse {
    pub reservation_id: String,
    pub quantity: u32,
    pub slot: Option<SlotResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelReservationResponse {
    pub reservation_id: String,
    pub status: ReservationStatus,
}

/// Refund created by a cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct RefundResponse {
    pub refund_id: String,
    pub amount: i64,
    pub processing_fee: i64,
    pub net_amount: i64,
    pub currency: String,
    pub status: RefundRecordStatus,
}

impl From<&RefundRecord> for RefundResponse {
    fn from(refund: &RefundRecord) -> Self {
        Self {
            refund_id: refund.id.to_string(),
            amount: refund.amount.minor(),
            processing_fee: refund.processing_fee.minor(),
            net_amount: refund.net_amount.minor(),
            currency: refund.currency.to_string(),
            status: refund.status,
        }
    }
}

/// Full refund record for admins.
#[derive(Debug, Clone, Serialize)]
pub struct RefundRecordResponse {
    pub id: String,
    pub reservation_id: String,
    pub user_id: String,
    pub amount: i64,
    pub processing_fee: i64,
    pub net_amount: i64,
    pub currency: String,
    pub status: RefundRecordStatus,
    pub reason: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub gateway_refund_references: Vec<String>,
    pub created_at: String,
}

impl From<&RefundRecord> for RefundRecordResponse {
    fn from(refund: &RefundRecord) -> Self {
        Self {
            id: refund.id.to_string(),
            reservation_id: refund.reservation_id.to_string(),
            user_id: refund.user_id.to_string(),
            amount: refund.amount.minor(),
            processing_fee: refund.processing_fee.minor(),
            net_amount: refund.net_amount.minor(),
            currency: refund.currency.to_string(),
            status: refund.status,
            reason: refund.reason.as_str().to_string(),
            reviewed_by: refund.metadata.reviewed_by.as_ref().map(|u| u.to_string()),
            reviewed_at: refund.metadata.reviewed_at.map(|t| t.as_datetime().to_rfc3339()),
            gateway_refund_references: refund.metadata.gateway_refund_references.clone(),
            created_at: refund.created_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Result of a quantity change.
///
/// Reductions carry `refund_amount`; increases carry the checkout to pay.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateQuantityResponse {
    pub reservation_id: String,
    /// Committed quantity after the request.
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_due: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingTopUpResponse {
    pub new_quantity: u32,
    pub amount: i64,
    pub expires_at: String,
}

/// Reservation as seen by its owner.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationResponse {
    pub id: String,
    pub kind: ReservationKind,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub slot: Option<SlotResponse>,
    pub event_id: Option<String>,
    pub starts_at: String,
    pub quantity: u32,
    pub original_quantity: u32,
    pub unit_price: i64,
    pub currency: String,
    pub pending_top_up: Option<PendingTopUpResponse>,
    pub refund_status: RefundStatus,
    pub refund_amount: i64,
    pub refund: Option<RefundResponse>,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
    pub paid_at: Option<String>,
    pub cancelled_at: Option<String>,
}

impl ReservationResponse {
    pub fn new(reservation: &Reservation, refund: Option<&RefundRecord>) -> Self {
        Self {
            id: reservation.id.to_string(),
            kind: reservation.kind(),
            status: reservation.status,
            payment_status: reservation.payment_status,
            slot: reservation.resource.slot().map(SlotResponse::from),
            event_id: reservation.resource.event_id().map(|id| id.to_string()),
            starts_at: reservation.starts_at.as_datetime().to_rfc3339(),
            quantity: reservation.quantity,
            original_quantity: reservation.original_quantity,
            unit_price: reservation.unit_price.minor(),
            currency: reservation.currency.to_string(),
            pending_top_up: reservation.pending_top_up.as_ref().map(|t| PendingTopUpResponse {
                new_quantity: t.new_quantity,
                amount: t.amount.minor(),
                expires_at: t.expires_at.as_datetime().to_rfc3339(),
            }),
            refund_status: reservation.refund_status,
            refund_amount: reservation.refund_amount.minor(),
            refund: refund.map(RefundResponse::from),
            cancellation_reason: reservation.cancellation_reason.clone(),
            created_at: reservation.created_at.as_datetime().to_rfc3339(),
            paid_at: reservation.paid_at.map(|t| t.as_datetime().to_rfc3339()),
            cancelled_at: reservation.cancelled_at.map(|t| t.as_datetime().to_rfc3339()),
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Internal detail, only populated in development.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::booking::test_support::{event, paid_registration};

    #[test]
    fn registration_quantity_defaults_to_one() {
        let json = r#"{"event_id":"e","name":"Ada","email":"ada@example.com","phone":"555"}"#;
        let request: CreateRegistrationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.quantity, 1);
    }

    #[test]
    fn review_decision_is_snake_case() {
        let request: ReviewRefundRequest = serde_json::from_str(r#"{"decision":"process"}"#).unwrap();
        assert_eq!(request.decision, ReviewDecision::Process);
    }

    #[test]
    fn reservation_response_reports_registration_fields() {
        let reservation = paid_registration(&event(10), "user-1", 3);
        let json = serde_json::to_value(ReservationResponse::new(&reservation, None)).unwrap();

        assert_eq!(json["kind"], "registration");
        assert_eq!(json["status"], "active");
        assert_eq!(json["payment_status"], "paid");
        assert_eq!(json["quantity"], 3);
        assert!(json["slot"].is_null());
    }

    #[test]
    fn slot_is_rendered_as_request_strings() {
        let slot = SlotDescriptor::parse("D1", "2025-01-10", "10:00").unwrap();
        let response = SlotResponse::from(&slot);
        assert_eq!(response.date, "2025-01-10");
        assert_eq!(response.time, "10:00");
    }

    #[test]
    fn quantity_response_omits_unused_fields() {
        let response = UpdateQuantityResponse {
            reservation_id: "r".to_string(),
            quantity: 3,
            refund_amount: Some(5_000),
            checkout_url: None,
            session_id: None,
            amount_due: None,
        };
        let json = serde_json::to_value(response).unwrap();
        assert!(json.get("checkout_url").is_none());
        assert_eq!(json["refund_amount"], 5_000);
    }

    #[test]
    fn diagnostic_is_omitted_when_absent() {
        let json = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "Reservation not found")).unwrap();
        assert!(json.get("diagnostic").is_none());
    }
}
