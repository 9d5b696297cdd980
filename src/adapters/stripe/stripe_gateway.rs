//! Stripe payment gateway adapter.
//!
//! Implements `PaymentGateway` against Stripe Checkout (one-off `payment`
//! mode) and the Refunds API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key).with_checkout_expiry_minutes(30);
//! let gateway = StripePaymentGateway::new(config);
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{Money, Timestamp};
use crate::ports::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentErrorCode, PaymentGateway, SessionStatus,
};

use super::stripe_types::{StripeCheckoutSession, StripeErrorBody, StripeRefund};

/// Stripe accepts checkout expiries between 30 minutes and 24 hours.
pub const MIN_CHECKOUT_EXPIRY_MINUTES: i64 = 30;
pub const MAX_CHECKOUT_EXPIRY_MINUTES: i64 = 24 * 60;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Checkout lifetime; Stripe's 24h default when unset.
    checkout_expiry_minutes: Option<i64>,
}

impl StripeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: "https://api.stripe.com".to_string(),
            checkout_expiry_minutes: None,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Checkout lifetime, clamped to what Stripe accepts.
    pub fn with_checkout_expiry_minutes(mut self, minutes: i64) -> Self {
        self.checkout_expiry_minutes =
            Some(minutes.clamp(MIN_CHECKOUT_EXPIRY_MINUTES, MAX_CHECKOUT_EXPIRY_MINUTES));
        self
    }
}

/// Stripe payment gateway adapter.
pub struct StripePaymentGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// Form parameters for a one-off checkout of `request.amount`.
    fn checkout_params(&self, request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount.minor().to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.line_item_description.clone(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                request.metadata.reservation_id.to_string(),
            ),
        ];

        for (key, value) in request.metadata.to_pairs() {
            params.push((format!("metadata[{}]", key), value));
        }

        if let Some(minutes) = self.config.checkout_expiry_minutes {
            let expires_at = Timestamp::now().add_minutes(minutes);
            params.push(("expires_at".to_string(), expires_at.as_unix_secs().to_string()));
        }

        params
    }

    /// Turns a non-2xx Stripe response into a `PaymentError`.
    async fn error_from_response(response: reqwest::Response, operation: &str) -> PaymentError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<StripeErrorBody>(&body).ok();

        let message = parsed
            .as_ref()
            .and_then(|b| b.error.message.clone())
            .unwrap_or_else(|| format!("Stripe API error ({})", status));
        let provider_code = parsed.and_then(|b| b.error.code);

        tracing::error!(
            operation,
            status = status.as_u16(),
            provider_code = provider_code.as_deref().unwrap_or(""),
            error = %message,
            "Stripe request failed"
        );

        let mut error = PaymentError::new(classify_status(status.as_u16(), operation), message);
        if let Some(code) = provider_code {
            error = error.with_provider_code(code);
        }
        error
    }
}

/// Maps an HTTP status to an error code. Server-side failures are retryable.
fn classify_status(status: u16, operation: &str) -> PaymentErrorCode {
    match status {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimitExceeded,
        500..=599 => PaymentErrorCode::NetworkError,
        400 | 402 if operation == "refund" => PaymentErrorCode::RefundRejected,
        400 => PaymentErrorCode::InvalidRequest,
        _ => PaymentErrorCode::ProviderError,
    }
}

fn parse_error(e: reqwest::Error) -> PaymentError {
    PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn open_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let params = self.checkout_params(&request);

        let response = self
            .http_client
            .post(self.url("/v1/checkout/sessions"))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, "open_checkout").await);
        }

        let session: StripeCheckoutSession = response.json().await.map_err(parse_error)?;
        let url = session
            .url
            .clone()
            .ok_or_else(|| PaymentError::provider("Checkout session has no hosted URL"))?;

        tracing::info!(
            session_id = %session.id,
            reservation_id = %request.metadata.reservation_id,
            amount = request.amount.minor(),
            "Stripe checkout session opened"
        );

        Ok(CheckoutSession {
            id: session.id,
            url,
            expires_at: Timestamp::from_unix_secs(session.expires_at),
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError> {
        let response = self
            .http_client
            .get(self.url(&format!("/v1/checkout/sessions/{}", session_id)))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, "get_session").await);
        }

        let session: StripeCheckoutSession = response.json().await.map_err(parse_error)?;

        Ok(SessionStatus {
            paid: session.is_paid(),
            amount_total: session.amount_total.unwrap_or(0),
            payment_reference: session.payment_intent,
        })
    }

    async fn refund(&self, payment_reference: &str, amount: Money) -> Result<String, PaymentError> {
        let amount_minor = amount.minor().to_string();
        let params = [
            ("payment_intent", payment_reference),
            ("amount", amount_minor.as_str()),
        ];

        let response = self
            .http_client
            .post(self.url("/v1/refunds"))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, "refund").await);
        }

        let refund: StripeRefund = response.json().await.map_err(parse_error)?;
        if refund.is_failed() {
            return Err(PaymentError::refund_rejected(format!(
                "Refund {} ended with status {}",
                refund.id, refund.status
            )));
        }

        tracing::info!(
            refund_id = %refund.id,
            payment_reference,
            amount = refund.amount,
            "Stripe refund issued"
        );

        Ok(refund.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, EventId, ReservationId, UserId};
    use crate::ports::CheckoutMetadata;

    fn test_config() -> StripeConfig {
        StripeConfig::new(SecretString::new("sk_test_123".to_string()))
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            amount: Money::from_minor(15_000).unwrap(),
            currency: Currency::new("usd").unwrap(),
            line_item_description: "Spring Workshop x6".to_string(),
            success_url: "https://app.test/ok".to_string(),
            cancel_url: "https://app.test/cancel".to_string(),
            metadata: CheckoutMetadata {
                reservation_id: ReservationId::new(),
                user_id: UserId::new("user-1").unwrap(),
                event_id: Some(EventId::new()),
                quantity: 6,
                target_quantity: None,
            },
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn config_with_base_url_strips_trailing_slash() {
        let config = test_config().with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn checkout_expiry_is_clamped() {
        assert_eq!(
            test_config().with_checkout_expiry_minutes(5).checkout_expiry_minutes,
            Some(MIN_CHECKOUT_EXPIRY_MINUTES)
        );
        assert_eq!(
            test_config().with_checkout_expiry_minutes(10_000).checkout_expiry_minutes,
            Some(MAX_CHECKOUT_EXPIRY_MINUTES)
        );
    }

    #[test]
    fn checkout_params_charge_total_as_single_line() {
        let gateway = StripePaymentGateway::new(test_config());
        let params = gateway.checkout_params(&request());

        assert_eq!(param(&params, "mode"), Some("payment"));
        assert_eq!(param(&params, "line_items[0][price_data][unit_amount]"), Some("15000"));
        assert_eq!(param(&params, "line_items[0][quantity]"), Some("1"));
        assert_eq!(param(&params, "metadata[quantity]"), Some("6"));
        assert!(param(&params, "metadata[event_id]").is_some());
        assert!(param(&params, "expires_at").is_none());
    }

    #[test]
    fn checkout_params_include_expiry_when_configured() {
        let gateway = StripePaymentGateway::new(test_config().with_checkout_expiry_minutes(45));
        let params = gateway.checkout_params(&request());
        let expires_at: i64 = param(&params, "expires_at").unwrap().parse().unwrap();
        assert!(expires_at > Timestamp::now().as_unix_secs());
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(classify_status(503, "get_session").is_retryable());
        assert!(classify_status(429, "get_session").is_retryable());
    }

    #[test]
    fn rejected_refund_is_not_retryable() {
        let code = classify_status(400, "refund");
        assert_eq!(code, PaymentErrorCode::RefundRejected);
        assert!(!code.is_retryable());
        assert_eq!(classify_status(400, "open_checkout"), PaymentErrorCode::InvalidRequest);
    }

    #[test]
    fn missing_session_is_not_found() {
        assert_eq!(classify_status(404, "get_session"), PaymentErrorCode::NotFound);
    }
}
