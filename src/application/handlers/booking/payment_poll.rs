//! Bounded polling of a checkout session until the gateway reports it paid.

use crate::domain::booking::BookingError;
use crate::ports::{PaymentGateway, RetryPolicy, SessionStatus};

/// Reads `session_id` until it is paid or the policy's attempts run out.
///
/// Read errors and unpaid sessions are both retried. Non-retryable gateway
/// errors on the last attempt are surfaced as-is.
///
/// # Errors
///
/// - `GatewayTransient` when the session is still unpaid after the last attempt
/// - the last gateway error, converted, when every read failed
pub async fn await_paid_session(
    gateway: &dyn PaymentGateway,
    retry: &dyn RetryPolicy,
    session_id: &str,
) -> Result<SessionStatus, BookingError> {
    let max_attempts = retry.max_attempts().max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            retry.pause(attempt).await;
        }

        match gateway.get_session(session_id).await {
            Ok(status) if status.paid => return Ok(status),
            Ok(_) => {
                tracing::warn!(session_id, attempt, max_attempts, "Checkout session not paid yet");
                last_error = None;
            }
            Err(e) => {
                tracing::warn!(
                    session_id,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Checkout session read failed"
                );
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !e.retryable => Err(e.into()),
        _ => Err(BookingError::GatewayTransient(format!(
            "session {} unpaid after {} attempts",
            session_id, max_attempts
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::retry::FixedDelayRetry;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::application::handlers::booking::test_support::checkout_request;
    use crate::ports::{PaymentError, RetryConfig};

    fn retry(attempts: u32) -> FixedDelayRetry {
        FixedDelayRetry::new(RetryConfig::immediate(attempts))
    }

    #[tokio::test]
    async fn paid_session_returns_on_first_read() {
        let gateway = MockPaymentGateway::new();
        let session = gateway.open_checkout(checkout_request(5_000)).await.unwrap();
        gateway.complete_session(&session.id);

        let status = await_paid_session(&gateway, &retry(3), &session.id).await.unwrap();
        assert!(status.paid);
        assert_eq!(gateway.call_count("get_session"), 1);
    }

    #[tokio::test]
    async fn late_payment_is_found_by_a_retry() {
        let gateway = MockPaymentGateway::new();
        let session = gateway.open_checkout(checkout_request(5_000)).await.unwrap();
        gateway.complete_session_after_reads(&session.id, 2);

        let status = await_paid_session(&gateway, &retry(3), &session.id).await.unwrap();
        assert!(status.paid);
        assert_eq!(gateway.call_count("get_session"), 3);
    }

    #[tokio::test]
    async fn unpaid_session_gives_up_after_max_attempts() {
        let gateway = MockPaymentGateway::new();
        let session = gateway.open_checkout(checkout_request(5_000)).await.unwrap();

        let err = await_paid_session(&gateway, &retry(3), &session.id).await.unwrap_err();
        assert!(matches!(err, BookingError::GatewayTransient(_)));
        assert_eq!(gateway.call_count("get_session"), 3);
    }

    #[tokio::test]
    async fn transient_read_errors_are_retried() {
        let gateway = MockPaymentGateway::new();
        let session = gateway.open_checkout(checkout_request(5_000)).await.unwrap();
        gateway.complete_session(&session.id);
        gateway.set_error(PaymentError::network("connection reset"));

        let status = await_paid_session(&gateway, &retry(3), &session.id).await.unwrap();
        assert!(status.paid);
        assert_eq!(gateway.call_count("get_session"), 2);
    }

    #[tokio::test]
    async fn persistent_fatal_error_is_surfaced() {
        let gateway = MockPaymentGateway::new();
        gateway.set_method_error("get_session", PaymentError::authentication("bad key"));

        let err = await_paid_session(&gateway, &retry(2), "cs_x").await.unwrap_err();
        assert!(matches!(err, BookingError::GatewayFatal(_)));
        assert_eq!(gateway.call_count("get_session"), 2);
    }
}
