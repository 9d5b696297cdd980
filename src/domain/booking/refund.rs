//! Refund record and its admin review lifecycle.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, Money, RefundId, ReservationId, StateMachine, Timestamp, UserId,
    ValidationError,
};

use super::{RefundMode, RefundQuote};

/// Minimum characters in a trimmed refund reason.
pub const MIN_REASON_LENGTH: usize = 10;

/// Status of a refund record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundRecordStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
}

impl StateMachine for RefundRecordStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use RefundRecordStatus::*;
        matches!(
            (self, target),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Processed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RefundRecordStatus::*;
        match self {
            Pending => vec![Approved, Rejected],
            Approved => vec![Processed],
            Rejected | Processed => vec![],
        }
    }
}

/// Admin decision on a refund record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
    Process,
}

impl ReviewDecision {
    pub fn target(&self) -> RefundRecordStatus {
        match self {
            ReviewDecision::Approve => RefundRecordStatus::Approved,
            ReviewDecision::Reject => RefundRecordStatus::Rejected,
            ReviewDecision::Process => RefundRecordStatus::Processed,
        }
    }
}

impl FromStr for ReviewDecision {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(ReviewDecision::Approve),
            "reject" => Ok(ReviewDecision::Reject),
            "process" => Ok(ReviewDecision::Process),
            _ => Err(ValidationError::invalid_format(
                "decision",
                "expected approve, reject or process",
            )),
        }
    }
}

/// Why the owner asked for their money back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefundReason(String);

impl RefundReason {
    pub fn new(reason: impl Into<String>) -> Result<Self, ValidationError> {
        let reason = reason.into().trim().to_string();
        if reason.is_empty() {
            return Err(ValidationError::empty_field("reason"));
        }
        let length = reason.chars().count();
        if length < MIN_REASON_LENGTH {
            return Err(ValidationError::invalid_format(
                "reason",
                format!("must be at least {} characters", MIN_REASON_LENGTH),
            ));
        }
        Ok(Self(reason))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Audit trail kept with each refund record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundMetadata {
    pub requested_by: UserId,
    pub requested_at: Timestamp,
    pub mode: RefundMode,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<Timestamp>,
    /// One gateway refund per charge the amount was split across.
    #[serde(default)]
    pub gateway_refund_references: Vec<String>,
}

/// One refund per reservation.
///
/// `processing_fee` and `net_amount` are reporting data; the payer receives `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: RefundId,
    pub reservation_id: ReservationId,
    pub user_id: UserId,
    pub amount: Money,
    pub processing_fee: Money,
    pub net_amount: Money,
    pub currency: Currency,
    pub status: RefundRecordStatus,
    pub reason: RefundReason,
    pub metadata: RefundMetadata,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RefundRecord {
    /// Creates a record for a refund that still needs admin review.
    pub fn pending(
        reservation_id: ReservationId,
        user_id: UserId,
        quote: &RefundQuote,
        currency: Currency,
        reason: RefundReason,
        now: Timestamp,
    ) -> Self {
        Self::build(
            reservation_id,
            user_id,
            quote,
            currency,
            reason,
            RefundRecordStatus::Pending,
            RefundMode::Review,
            Vec::new(),
            now,
        )
    }

    /// Creates a record for a refund the gateway has already paid out.
    pub fn processed(
        reservation_id: ReservationId,
        user_id: UserId,
        quote: &RefundQuote,
        currency: Currency,
        reason: RefundReason,
        gateway_refund_references: Vec<String>,
        now: Timestamp,
    ) -> Self {
        Self::build(
            reservation_id,
            user_id,
            quote,
            currency,
            reason,
            RefundRecordStatus::Processed,
            RefundMode::Immediate,
            gateway_refund_references,
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        reservation_id: ReservationId,
        user_id: UserId,
        quote: &RefundQuote,
        currency: Currency,
        reason: RefundReason,
        status: RefundRecordStatus,
        mode: RefundMode,
        gateway_refund_references: Vec<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: RefundId::new(),
            reservation_id,
            user_id: user_id.clone(),
            amount: quote.amount,
            processing_fee: quote.processing_fee,
            net_amount: quote.net_amount,
            currency,
            status,
            reason,
            metadata: RefundMetadata {
                requested_by: user_id,
                requested_at: now,
                mode,
                reviewed_by: None,
                reviewed_at: None,
                gateway_refund_references,
            },
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an admin decision, stamping the reviewer.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the record is not in an allowed source state.
    pub fn review(
        &mut self,
        decision: ReviewDecision,
        reviewer: UserId,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        let target = decision.target();
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| self.invalid_transition(target))?;
        self.metadata.reviewed_by = Some(reviewer);
        self.metadata.reviewed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn record_gateway_refunds(&mut self, references: Vec<String>) {
        self.metadata.gateway_refund_references.extend(references);
    }

    fn invalid_transition(&self, target: RefundRecordStatus) -> DomainError {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!("Cannot move refund from {:?} to {:?}", self.status, target),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(amount: i64) -> RefundQuote {
        RefundQuote {
            amount: Money::from_minor(amount).unwrap(),
            processing_fee: Money::ZERO,
            net_amount: Money::from_minor(amount).unwrap(),
            percentage: crate::domain::foundation::Percentage::HUNDRED,
            days_before: Some(5),
        }
    }

    fn pending_record() -> RefundRecord {
        RefundRecord::pending(
            ReservationId::new(),
            UserId::new("user-1").unwrap(),
            &quote(5_000),
            Currency::new("usd").unwrap(),
            RefundReason::new("Cannot make it anymore").unwrap(),
            Timestamp::now(),
        )
    }

    fn admin() -> UserId {
        UserId::new("admin-1").unwrap()
    }

    #[test]
    fn short_reason_is_rejected() {
        let err = RefundReason::new("   too short   ").unwrap_err();
        assert_eq!(err.field(), "reason");
    }

    #[test]
    fn ten_character_reason_is_accepted() {
        assert!(RefundReason::new("  0123456789  ").is_ok());
    }

    #[test]
    fn pending_record_can_be_approved_then_processed() {
        let mut record = pending_record();
        record.review(ReviewDecision::Approve, admin(), Timestamp::now()).unwrap();
        assert_eq!(record.status, RefundRecordStatus::Approved);
        record.review(ReviewDecision::Process, admin(), Timestamp::now()).unwrap();
        assert_eq!(record.status, RefundRecordStatus::Processed);
        assert_eq!(record.metadata.reviewed_by, Some(admin()));
    }

    #[test]
    fn pending_record_cannot_be_processed_directly() {
        let mut record = pending_record();
        let err = record
            .review(ReviewDecision::Process, admin(), Timestamp::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(record.status, RefundRecordStatus::Pending);
    }

    #[test]
    fn rejected_record_is_terminal() {
        let mut record = pending_record();
        record.review(ReviewDecision::Reject, admin(), Timestamp::now()).unwrap();
        assert!(record
            .review(ReviewDecision::Approve, admin(), Timestamp::now())
            .is_err());
    }

    #[test]
    fn processed_record_keeps_gateway_references() {
        let record = RefundRecord::processed(
            ReservationId::new(),
            UserId::new("user-1").unwrap(),
            &quote(2_000),
            Currency::new("usd").unwrap(),
            RefundReason::new("Schedule conflict came up").unwrap(),
            vec!["re_123".to_string(), "re_124".to_string()],
            Timestamp::now(),
        );
        assert_eq!(record.status, RefundRecordStatus::Processed);
        assert_eq!(record.metadata.mode, RefundMode::Immediate);
        assert_eq!(record.metadata.gateway_refund_references, vec!["re_123", "re_124"]);
    }

    #[test]
    fn decision_parses_case_insensitively() {
        assert_eq!("Approve".parse::<ReviewDecision>().unwrap(), ReviewDecision::Approve);
        assert!("maybe".parse::<ReviewDecision>().is_err());
    }
}
