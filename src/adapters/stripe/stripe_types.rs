//! Stripe API objects used by the gateway adapter.
//!
//! Only the fields the booking core reads are modeled; everything else in
//! Stripe's responses is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ════════════════════════════════════════════════════════════════════════════════
// Checkout Sessions
// ════════════════════════════════════════════════════════════════════════════════

/// A Checkout Session as returned by `POST/GET /v1/checkout/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,

    /// Hosted page URL; absent once the session is complete or expired.
    #[serde(default)]
    pub url: Option<String>,

    /// Unix timestamp when the session expires.
    pub expires_at: i64,

    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,

    /// Total in minor units, after discounts and taxes.
    #[serde(default)]
    pub amount_total: Option<i64>,

    /// PaymentIntent id once a payment was attempted.
    #[serde(default)]
    pub payment_intent: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Refunds
// ════════════════════════════════════════════════════════════════════════════════

/// A Refund as returned by `POST /v1/refunds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub amount: i64,
    /// `pending`, `succeeded`, `failed`, `canceled` or `requires_action`.
    pub status: String,
}

impl StripeRefund {
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "canceled")
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════════

/// Error envelope Stripe returns with non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paid_checkout_session() {
        let json = r#"{
            "id": "cs_test_a1",
            "object": "checkout.session",
            "url": null,
            "expires_at": 1736503200,
            "payment_status": "paid",
            "amount_total": 15000,
            "payment_intent": "pi_3Nx",
            "metadata": {"reservation_id": "550e8400-e29b-41d4-a716-446655440000"}
        }"#;
        let session: StripeCheckoutSession = serde_json::from_str(json).unwrap();

        assert!(session.is_paid());
        assert_eq!(session.amount_total, Some(15_000));
        assert_eq!(session.payment_intent.as_deref(), Some("pi_3Nx"));
        assert!(session.url.is_none());
    }

    #[test]
    fn parses_open_checkout_session() {
        let json = r#"{
            "id": "cs_test_b2",
            "url": "https://checkout.stripe.com/c/pay/cs_test_b2",
            "expires_at": 1736503200,
            "payment_status": "unpaid",
            "amount_total": 5000,
            "payment_intent": null
        }"#;
        let session: StripeCheckoutSession = serde_json::from_str(json).unwrap();

        assert!(!session.is_paid());
        assert!(session.metadata.is_empty());
    }

    #[test]
    fn failed_refund_is_detected() {
        let refund: StripeRefund =
            serde_json::from_str(r#"{"id":"re_1","amount":500,"status":"failed"}"#).unwrap();
        assert!(refund.is_failed());
    }

    #[test]
    fn parses_error_envelope() {
        let json = r#"{"error":{"type":"invalid_request_error","code":"charge_already_refunded","message":"Charge ch_1 has already been refunded."}}"#;
        let body: StripeErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.error.code.as_deref(), Some("charge_already_refunded"));
    }
}
