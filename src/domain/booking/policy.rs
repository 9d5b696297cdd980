//! Time-based refund policy.
//!
//! A policy is an ordered list of tiers keyed by whole days between the
//! cancellation and the resource start, a processing fee rate, and a mode
//! deciding whether money moves immediately or after admin review.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{BasisPoints, Money, Percentage, Timestamp, ValidationError};

/// Whether a refund request pays out immediately or waits for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundMode {
    /// Gateway refund issued while cancelling; record created `processed`.
    Immediate,

    /// Record created `pending`; gateway refund issued when an admin processes it.
    Review,
}

/// One band of the policy: `min_days..=max_days` before start refunds `percentage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundTier {
    pub min_days: u32,
    /// `None` means unbounded.
    pub max_days: Option<u32>,
    pub percentage: Percentage,
}

impl RefundTier {
    fn covers(&self, days: u32) -> bool {
        days >= self.min_days && self.max_days.map_or(true, |max| days <= max)
    }
}

/// Result of applying a policy to a paid amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundQuote {
    /// Amount returned to the payer.
    pub amount: Money,
    /// Advisory: `amount × fee rate`.
    pub processing_fee: Money,
    /// Advisory: `amount − processing_fee`.
    pub net_amount: Money,
    pub percentage: Percentage,
    /// Whole days before start; `None` when the start has passed.
    pub days_before: Option<u32>,
}

impl RefundQuote {
    pub fn nothing(days_before: Option<u32>) -> Self {
        Self {
            amount: Money::ZERO,
            processing_fee: Money::ZERO,
            net_amount: Money::ZERO,
            percentage: Percentage::ZERO,
            days_before,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    pub tiers: Vec<RefundTier>,
    pub processing_fee: BasisPoints,
    pub mode: RefundMode,
}

impl RefundPolicy {
    /// Builds a policy, rejecting tiers whose bounds are inverted.
    pub fn new(
        tiers: Vec<RefundTier>,
        processing_fee: BasisPoints,
        mode: RefundMode,
    ) -> Result<Self, ValidationError> {
        for tier in &tiers {
            if let Some(max) = tier.max_days {
                if max < tier.min_days {
                    return Err(ValidationError::out_of_range(
                        "max_days",
                        i64::from(tier.min_days),
                        i64::from(u32::MAX),
                        i64::from(max),
                    ));
                }
            }
        }
        Ok(Self {
            tiers,
            processing_fee,
            mode,
        })
    }

    /// Event registrations: half back inside a week, full refund before that.
    pub fn default_registration() -> Self {
        Self {
            tiers: vec![
                RefundTier {
                    min_days: 0,
                    max_days: Some(7),
                    percentage: Percentage::clamped(50),
                },
                RefundTier {
                    min_days: 8,
                    max_days: None,
                    percentage: Percentage::HUNDRED,
                },
            ],
            processing_fee: BasisPoints::default(),
            mode: RefundMode::Immediate,
        }
    }

    /// Appointments: full refund while the slot is in the future, after review.
    pub fn default_appointment() -> Self {
        Self {
            tiers: vec![RefundTier {
                min_days: 0,
                max_days: None,
                percentage: Percentage::HUNDRED,
            }],
            processing_fee: BasisPoints::default(),
            mode: RefundMode::Review,
        }
    }

    pub fn with_processing_fee(mut self, rate: BasisPoints) -> Self {
        self.processing_fee = rate;
        self
    }

    /// Percentage of the first tier covering `days`, or zero.
    pub fn percentage_for(&self, days: u32) -> Percentage {
        self.tiers
            .iter()
            .find(|tier| tier.covers(days))
            .map(|tier| tier.percentage)
            .unwrap_or(Percentage::ZERO)
    }

    /// Computes the refund for `paid` when cancelling at `now` a resource
    /// starting at `starts_at`. Never exceeds `paid`.
    pub fn quote(&self, paid: Money, starts_at: &Timestamp, now: &Timestamp) -> RefundQuote {
        let days_before = now.whole_days_until(starts_at);
        let Some(days) = days_before else {
            return RefundQuote::nothing(None);
        };
        if paid.is_zero() {
            return RefundQuote::nothing(days_before);
        }

        let percentage = self.percentage_for(days);
        let amount = paid.percent(percentage);
        let processing_fee = amount.apply_rate(self.processing_fee);

        RefundQuote {
            amount,
            processing_fee,
            net_amount: amount.saturating_sub(processing_fee),
            percentage,
            days_before,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cents(minor: i64) -> Money {
        Money::from_minor(minor).unwrap()
    }

    #[test]
    fn three_days_before_event_refunds_half() {
        let now = Timestamp::now();
        let starts = now.add_days(3).add_minutes(60);
        let quote = RefundPolicy::default_registration().quote(cents(15_000), &starts, &now);

        assert_eq!(quote.amount, cents(7_500));
        assert_eq!(quote.percentage.value(), 50);
        assert_eq!(quote.days_before, Some(3));
    }

    #[test]
    fn eight_days_before_event_refunds_everything() {
        let now = Timestamp::now();
        let starts = now.add_days(8).add_minutes(1);
        let quote = RefundPolicy::default_registration().quote(cents(15_000), &starts, &now);
        assert_eq!(quote.amount, cents(15_000));
    }

    #[test]
    fn after_start_refunds_nothing() {
        let now = Timestamp::now();
        let quote = RefundPolicy::default_registration().quote(cents(15_000), &now.add_days(-1), &now);
        assert_eq!(quote, RefundQuote::nothing(None));
    }

    #[test]
    fn zero_priced_resource_never_refunds() {
        let now = Timestamp::now();
        let quote = RefundPolicy::default_appointment().quote(Money::ZERO, &now.add_days(30), &now);
        assert!(quote.amount.is_zero());
    }

    #[test]
    fn processing_fee_is_advisory() {
        let now = Timestamp::now();
        let policy = RefundPolicy::default_appointment().with_processing_fee(BasisPoints::try_new(300).unwrap());
        let quote = policy.quote(cents(10_000), &now.add_days(2), &now);

        assert_eq!(quote.amount, cents(10_000));
        assert_eq!(quote.processing_fee, cents(300));
        assert_eq!(quote.net_amount, cents(9_700));
    }

    #[test]
    fn gap_between_tiers_refunds_nothing() {
        let policy = RefundPolicy::new(
            vec![RefundTier {
                min_days: 14,
                max_days: None,
                percentage: Percentage::HUNDRED,
            }],
            BasisPoints::default(),
            RefundMode::Immediate,
        )
        .unwrap();
        assert_eq!(policy.percentage_for(5), Percentage::ZERO);
        assert_eq!(policy.percentage_for(14), Percentage::HUNDRED);
    }

    #[test]
    fn inverted_tier_is_rejected() {
        let result = RefundPolicy::new(
            vec![RefundTier {
                min_days: 10,
                max_days: Some(3),
                percentage: Percentage::HUNDRED,
            }],
            BasisPoints::default(),
            RefundMode::Review,
        );
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn refund_never_exceeds_paid(
            paid in 0i64..10_000_000,
            pct in 0u8..=100,
            fee in 0u16..=10_000,
            days in 0i64..400,
        ) {
            let policy = RefundPolicy::new(
                vec![RefundTier { min_days: 0, max_days: None, percentage: Percentage::try_new(pct).unwrap() }],
                BasisPoints::try_new(fee).unwrap(),
                RefundMode::Immediate,
            ).unwrap();
            let now = Timestamp::now();
            let quote = policy.quote(cents(paid), &now.add_days(days).add_minutes(1), &now);

            prop_assert!(quote.amount <= cents(paid));
            prop_assert!(quote.net_amount <= quote.amount);
            prop_assert_eq!(quote.net_amount.saturating_add(quote.processing_fee), quote.amount);
        }
    }
}
