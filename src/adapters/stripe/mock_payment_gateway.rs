//! Mock payment gateway for testing.
//!
//! Provides a configurable in-process implementation of `PaymentGateway`.
//! Supports:
//! - Simulated payer behavior (complete, complete with another amount, pay late)
//! - Error injection per method
//! - Call tracking
//! - Refund capture, refusing refunds beyond what a charge has left

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::foundation::{Money, Timestamp};
use crate::ports::{CheckoutRequest, CheckoutSession, PaymentError, PaymentGateway, SessionStatus};

/// Mock payment gateway for testing.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
///
/// // Payer finishes the hosted checkout
/// gateway.complete_session(&session_id);
///
/// // Inject errors
/// gateway.set_method_error("refund", PaymentError::refund_rejected("Already refunded"));
///
/// assert_eq!(gateway.call_count("get_session"), 1);
/// ```
#[derive(Default)]
pub struct MockPaymentGateway {
    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, MockSession>,

    /// Opened checkouts in order, for assertions.
    checkouts: Vec<CheckoutRequest>,

    /// Issued refunds as (payment reference, amount).
    refunds: Vec<(String, Money)>,

    /// Charged and refunded minor units per payment reference.
    charges: HashMap<String, ChargeLedger>,

    /// Checkout lifetime; negative values open already-expired sessions.
    checkout_ttl_minutes: Option<i64>,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    sequence: u64,
}

#[derive(Debug, Clone)]
struct MockSession {
    amount: Money,
    paid: bool,
    amount_total: i64,
    payment_reference: Option<String>,
    /// Reads that still report unpaid before the payment becomes visible.
    unpaid_reads_remaining: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChargeLedger {
    charged: i64,
    refunded: i64,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

const DEFAULT_CHECKOUT_TTL_MINUTES: i64 = 30;

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payer Simulation
    // ════════════════════════════════════════════════════════════════════════════

    /// Payer completed the checkout for the requested amount.
    pub fn complete_session(&self, session_id: &str) {
        let mut state = self.state();
        let reference = state.next_id("pi_mock");
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.paid = true;
            session.amount_total = session.amount.minor();
            session.payment_reference = Some(reference.clone());
            let charged = session.amount_total;
            state.charges.insert(
                reference,
                ChargeLedger {
                    charged,
                    refunded: 0,
                },
            );
        }
    }

    /// Gateway reports the session paid but with a different total.
    pub fn complete_session_with_amount(&self, session_id: &str, amount_total: i64) {
        self.complete_session(session_id);
        let mut state = self.state();
        let reference = state.sessions.get_mut(session_id).and_then(|session| {
            session.amount_total = amount_total;
            session.payment_reference.clone()
        });
        if let Some(reference) = reference {
            if let Some(ledger) = state.charges.get_mut(&reference) {
                ledger.charged = amount_total;
            }
        }
    }

    /// A charge made outside a mock checkout, e.g. for seeded reservations.
    pub fn record_charge(&self, payment_reference: &str, amount: Money) {
        self.state().charges.insert(
            payment_reference.to_string(),
            ChargeLedger {
                charged: amount.minor(),
                refunded: 0,
            },
        );
    }

    /// Session is paid, but the first `reads` lookups still report it unpaid.
    pub fn complete_session_after_reads(&self, session_id: &str, reads: u32) {
        self.complete_session(session_id);
        if let Some(session) = self.state().sessions.get_mut(session_id) {
            session.unpaid_reads_remaining = reads;
        }
    }

    /// Lifetime of checkouts opened from now on.
    pub fn set_checkout_ttl_minutes(&self, minutes: i64) {
        self.state().checkout_ttl_minutes = Some(minutes);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    /// Checkout requests received, in order.
    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.state().checkouts.clone()
    }

    /// Refunds issued as (payment reference, amount).
    pub fn refunds(&self) -> Vec<(String, Money)> {
        self.state().refunds.clone()
    }

    /// Payment reference of a completed session.
    pub fn payment_reference(&self, session_id: &str) -> Option<String> {
        self.state()
            .sessions
            .get(session_id)
            .and_then(|s| s.payment_reference.clone())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.state();

        // Check method-specific error first
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        // Check global error (consumes it)
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{}_{:06}", prefix, self.sequence)
    }
}

impl Clone for MockPaymentGateway {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn open_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        self.record_call(
            "open_checkout",
            vec![
                request.amount.minor().to_string(),
                request.currency.to_string(),
                request.metadata.reservation_id.to_string(),
            ],
        );
        self.check_error("open_checkout")?;

        let mut state = self.state();
        let id = state.next_id("cs_mock");
        let ttl = state
            .checkout_ttl_minutes
            .unwrap_or(DEFAULT_CHECKOUT_TTL_MINUTES);

        state.sessions.insert(
            id.clone(),
            MockSession {
                amount: request.amount,
                paid: false,
                amount_total: request.amount.minor(),
                payment_reference: None,
                unpaid_reads_remaining: 0,
            },
        );
        state.checkouts.push(request);

        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.com/c/pay/{}", id),
            id,
            expires_at: Timestamp::now().add_minutes(ttl),
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError> {
        self.record_call("get_session", vec![session_id.to_string()]);
        self.check_error("get_session")?;

        let mut state = self.state();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| PaymentError::not_found("Checkout session"))?;

        if session.unpaid_reads_remaining > 0 {
            session.unpaid_reads_remaining -= 1;
            return Ok(SessionStatus {
                paid: false,
                amount_total: session.amount.minor(),
                payment_reference: None,
            });
        }

        Ok(SessionStatus {
            paid: session.paid,
            amount_total: session.amount_total,
            payment_reference: session.payment_reference.clone(),
        })
    }

    async fn refund(&self, payment_reference: &str, amount: Money) -> Result<String, PaymentError> {
        self.record_call(
            "refund",
            vec![payment_reference.to_string(), amount.minor().to_string()],
        );
        self.check_error("refund")?;

        let mut state = self.state();
        let ledger = state
            .charges
            .get_mut(payment_reference)
            .ok_or_else(|| PaymentError::not_found("Charge"))?;
        let remaining = ledger.charged - ledger.refunded;
        if amount.minor() > remaining {
            return Err(PaymentError::refund_rejected(format!(
                "Refund of {} exceeds the {} remaining on {}",
                amount.minor(),
                remaining,
                payment_reference
            )));
        }
        ledger.refunded += amount.minor();
        state.refunds.push((payment_reference.to_string(), amount));
        Ok(state.next_id("re_mock"))
    }
}
