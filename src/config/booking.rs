//! Booking behaviour configuration
//!
//! Refund tiers are written compactly so they fit in one environment
//! variable: `"0-7:50,8+:100"` means 0 to 7 days before start refunds 50%,
//! 8 or more days refunds 100%.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::handlers::booking::RefundPolicies;
use crate::domain::booking::{RefundMode, RefundPolicy, RefundTier};
use crate::domain::foundation::{BasisPoints, Percentage};
use crate::ports::RetryConfig;

/// Booking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Attempts when polling a checkout session, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between polling attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Lifetime requested for checkout sessions
    #[serde(default = "default_checkout_expiry")]
    pub checkout_expiry_minutes: i64,

    /// How often the abandoned-checkout sweep runs
    #[serde(default = "default_sweep_interval")]
    pub abandoned_sweep_interval_secs: u64,

    /// Age after which an unpaid pending reservation is released
    #[serde(default = "default_abandoned_after")]
    pub abandoned_after_minutes: i64,

    /// Reservations released per sweep at most
    #[serde(default = "default_sweep_limit")]
    pub sweep_limit: u32,

    #[serde(default = "default_registration_tiers")]
    pub registration_refund_tiers: String,

    #[serde(default = "default_registration_mode")]
    pub registration_refund_mode: RefundMode,

    #[serde(default)]
    pub registration_processing_fee_bps: u16,

    #[serde(default = "default_appointment_tiers")]
    pub appointment_refund_tiers: String,

    #[serde(default = "default_appointment_mode")]
    pub appointment_refund_mode: RefundMode,

    #[serde(default)]
    pub appointment_processing_fee_bps: u16,
}

impl BookingConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.abandoned_sweep_interval_secs)
    }

    /// Build both refund policies.
    pub fn refund_policies(&self) -> Result<RefundPolicies, ValidationError> {
        Ok(RefundPolicies {
            appointment: build_policy(
                "appointment",
                &self.appointment_refund_tiers,
                self.appointment_processing_fee_bps,
                self.appointment_refund_mode,
            )?,
            registration: build_policy(
                "registration",
                &self.registration_refund_tiers,
                self.registration_processing_fee_bps,
                self.registration_refund_mode,
            )?,
        })
    }

    /// Validate booking configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.retry_attempts == 0 || self.retry_attempts > 10 {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        if !(30..=1440).contains(&self.checkout_expiry_minutes) {
            return Err(ValidationError::InvalidCheckoutExpiry);
        }
        if self.abandoned_sweep_interval_secs == 0
            || self.abandoned_after_minutes <= 0
            || self.sweep_limit == 0
        {
            return Err(ValidationError::InvalidSweep);
        }
        // A checkout still open at the gateway must never be swept.
        if self.abandoned_after_minutes <= self.checkout_expiry_minutes {
            return Err(ValidationError::InvalidSweep);
        }
        self.refund_policies()?;
        Ok(())
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            checkout_expiry_minutes: default_checkout_expiry(),
            abandoned_sweep_interval_secs: default_sweep_interval(),
            abandoned_after_minutes: default_abandoned_after(),
            sweep_limit: default_sweep_limit(),
            registration_refund_tiers: default_registration_tiers(),
            registration_refund_mode: default_registration_mode(),
            registration_processing_fee_bps: 0,
            appointment_refund_tiers: default_appointment_tiers(),
            appointment_refund_mode: default_appointment_mode(),
            appointment_processing_fee_bps: 0,
        }
    }
}

fn build_policy(
    kind: &'static str,
    tiers: &str,
    fee_bps: u16,
    mode: RefundMode,
) -> Result<RefundPolicy, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidRefundPolicy { kind, reason };

    let tiers = parse_tiers(tiers).map_err(invalid)?;
    let fee = BasisPoints::try_new(fee_bps).map_err(|e| invalid(e.to_string()))?;
    RefundPolicy::new(tiers, fee, mode).map_err(|e| invalid(e.to_string()))
}

/// Parse `"min-max:pct"` / `"min+:pct"` entries separated by commas.
fn parse_tiers(raw: &str) -> Result<Vec<RefundTier>, String> {
    let mut tiers = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (range, pct) = entry
            .split_once(':')
            .ok_or_else(|| format!("tier '{entry}' is missing ':percentage'"))?;

        let pct: u8 = pct
            .trim()
            .parse()
            .map_err(|_| format!("tier '{entry}' has a non-numeric percentage"))?;
        let percentage = Percentage::try_new(pct).map_err(|e| e.to_string())?;

        let range = range.trim();
        let (min_days, max_days) = if let Some(min) = range.strip_suffix('+') {
            (parse_days(entry, min)?, None)
        } else {
            let (min, max) = range
                .split_once('-')
                .ok_or_else(|| format!("tier '{entry}' needs 'min-max' or 'min+'"))?;
            (parse_days(entry, min)?, Some(parse_days(entry, max)?))
        };

        tiers.push(RefundTier {
            min_days,
            max_days,
            percentage,
        });
    }

    if tiers.is_empty() {
        return Err("no tiers given".to_string());
    }
    Ok(tiers)
}

fn parse_days(entry: &str, raw: &str) -> Result<u32, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("tier '{entry}' has a non-numeric day bound"))
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_checkout_expiry() -> i64 {
    30
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_abandoned_after() -> i64 {
    45
}

fn default_sweep_limit() -> u32 {
    100
}

fn default_registration_tiers() -> String {
    "0-7:50,8+:100".to_string()
}

fn default_registration_mode() -> RefundMode {
    RefundMode::Immediate
}

fn default_appointment_tiers() -> String {
    "0+:100".to_string()
}

fn default_appointment_mode() -> RefundMode {
    RefundMode::Review
}
