//! Money value objects.
//!
//! All amounts are integral minor currency units (cents) so that our arithmetic
//! matches the gateway's integer accounting exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// An amount in minor currency units, between zero and [`Money::MAX_MINOR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    /// Largest amount a single Stripe charge accepts (999,999.99 in two-decimal currencies).
    pub const MAX_MINOR: i64 = 99_999_999;

    /// Creates an amount, rejecting negatives and anything above [`Money::MAX_MINOR`].
    pub fn from_minor(minor: i64) -> Result<Self, ValidationError> {
        if !(0..=Self::MAX_MINOR).contains(&minor) {
            return Err(ValidationError::out_of_range("amount", 0, Self::MAX_MINOR, minor));
        }
        Ok(Self(minor))
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Unit price times a quantity.
    pub fn times(&self, quantity: u32) -> Result<Self, ValidationError> {
        self.0
            .checked_mul(i64::from(quantity))
            .filter(|total| *total <= Self::MAX_MINOR)
            .map(Self)
            .ok_or_else(|| {
                ValidationError::invalid_format("amount", "total exceeds the maximum chargeable amount")
            })
    }

    /// Sum of two amounts, bounded like [`Money::from_minor`].
    pub fn checked_add(&self, other: Money) -> Result<Self, ValidationError> {
        Self::from_minor(self.0.saturating_add(other.0))
    }

    /// The given percentage of this amount, rounded down.
    pub fn percent(&self, pct: Percentage) -> Self {
        Self::scaled(self.0, i128::from(pct.value()), 100)
    }

    /// The given rate of this amount, rounded down.
    pub fn apply_rate(&self, rate: BasisPoints) -> Self {
        Self::scaled(self.0, i128::from(rate.value()), 10_000)
    }

    // `numerator <= denominator`, so the result never exceeds `minor`.
    fn scaled(minor: i64, numerator: i128, denominator: i128) -> Self {
        let value = i128::from(minor) * numerator / denominator;
        Self(i64::try_from(value).unwrap_or(minor))
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(&self, other: Money) -> Self {
        Self((self.0 - other.0).max(0))
    }

    pub fn saturating_add(&self, other: Money) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl TryFrom<i64> for Money {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Money::from_minor(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// ISO 4217 currency code, stored lowercase (the gateway's convention).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim().to_ascii_lowercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                "expected a three-letter ISO 4217 code",
            ));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Self = Self(0);
    pub const HUNDRED: Self = Self(100);

    /// Creates a Percentage, capping values above 100.
    pub const fn clamped(value: u8) -> Self {
        if value > 100 {
            Self(100)
        } else {
            Self(value)
        }
    }

    /// Creates a Percentage, returning error if out of range.
    pub fn try_new(value: u8) -> Result<Self, ValidationError> {
        if value > 100 {
            return Err(ValidationError::out_of_range(
                "percentage",
                0,
                100,
                i64::from(value),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Percentage {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Percentage::try_new(value)
    }
}

impl From<Percentage> for u8 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A rate in hundredths of a percent (250 = 2.5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct BasisPoints(u16);

impl BasisPoints {
    pub fn try_new(value: u16) -> Result<Self, ValidationError> {
        if value > 10_000 {
            return Err(ValidationError::out_of_range(
                "basis_points",
                0,
                10_000,
                i64::from(value),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for BasisPoints {
    type Error = ValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        BasisPoints::try_new(value)
    }
}

impl From<BasisPoints> for u16 {
    fn from(value: BasisPoints) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_rejects_negative() {
        assert!(Money::from_minor(-1).is_err());
        assert!(Money::from_minor(0).is_ok());
    }

    #[test]
    fn money_times_multiplies_unit_price() {
        let price = Money::from_minor(2_500).unwrap();
        assert_eq!(price.times(6).unwrap().minor(), 15_000);
    }

    #[test]
    fn money_rejects_amounts_above_gateway_maximum() {
        assert!(Money::from_minor(Money::MAX_MINOR).is_ok());
        assert!(Money::from_minor(Money::MAX_MINOR + 1).is_err());
        assert!(Money::from_minor(100_000_000_000_000_000).is_err());
        assert!(serde_json::from_str::<Money>("100000000000000000").is_err());
    }

    #[test]
    fn money_times_stays_within_maximum() {
        let price = Money::from_minor(Money::MAX_MINOR / 2).unwrap();
        assert!(price.times(2).is_ok());
        assert!(price.times(3).is_err());
        assert!(price.times(u32::MAX).is_err());
    }

    #[test]
    fn checked_add_rejects_totals_above_maximum() {
        let half = Money::from_minor(Money::MAX_MINOR / 2 + 1).unwrap();
        assert!(half.checked_add(half).is_err());
        assert_eq!(half.checked_add(Money::ZERO).unwrap(), half);
    }

    #[test]
    fn scaling_the_largest_amount_does_not_overflow() {
        let max = Money::from_minor(Money::MAX_MINOR).unwrap();
        assert_eq!(max.percent(Percentage::HUNDRED), max);
        assert_eq!(max.apply_rate(BasisPoints::try_new(10_000).unwrap()), max);
        assert_eq!(max.percent(Percentage::try_new(50).unwrap()).minor(), 49_999_999);
    }

    #[test]
    fn percent_rounds_down() {
        let amount = Money::from_minor(999).unwrap();
        assert_eq!(amount.percent(Percentage::try_new(50).unwrap()).minor(), 499);
    }

    #[test]
    fn basis_points_fee() {
        let amount = Money::from_minor(10_000).unwrap();
        let rate = BasisPoints::try_new(290).unwrap();
        assert_eq!(amount.apply_rate(rate).minor(), 290);
    }

    #[test]
    fn currency_normalizes_case() {
        assert_eq!(Currency::new("USD").unwrap().as_str(), "usd");
        assert!(Currency::new("dollars").is_err());
    }

    #[test]
    fn percentage_rejects_over_hundred() {
        assert!(Percentage::try_new(101).is_err());
        assert!(serde_json::from_str::<Percentage>("150").is_err());
    }

    #[test]
    fn money_displays_major_units() {
        assert_eq!(Money::from_minor(12_345).unwrap().to_string(), "123.45");
    }
}
