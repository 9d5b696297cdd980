//! Payment configuration

use secrecy::SecretString;
use serde::Deserialize;

use super::error::ValidationError;
use crate::application::handlers::booking::CheckoutUrls;

/// Placeholder substituted with the reservation id in checkout return URLs.
pub const RESERVATION_PLACEHOLDER: &str = "{reservation_id}";

/// Payment configuration (Stripe checkout)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe API base URL, overridable for stripe-mock
    #[serde(default = "default_api_base_url")]
    pub stripe_api_base_url: String,

    /// Where Stripe sends the payer after paying
    #[serde(default)]
    pub success_url_template: String,

    /// Where Stripe sends the payer after backing out
    #[serde(default)]
    pub cancel_url_template: String,

    /// ISO 4217 code used when a booking request names none
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl PaymentConfig {
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    pub fn api_key(&self) -> SecretString {
        SecretString::new(self.stripe_api_key.clone())
    }

    pub fn checkout_urls(&self) -> CheckoutUrls {
        CheckoutUrls::new(&self.success_url_template, &self.cancel_url_template)
    }

    /// Currency normalised to lowercase.
    pub fn default_currency(&self) -> String {
        self.currency.to_ascii_lowercase()
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired(
                "BOOKING__PAYMENT__STRIPE_API_KEY",
            ));
        }
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        validate_template("success_url_template", &self.success_url_template)?;
        validate_template("cancel_url_template", &self.cancel_url_template)?;

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(self.currency.clone()));
        }
        Ok(())
    }
}

fn validate_template(field: &'static str, template: &str) -> Result<(), ValidationError> {
    if template.is_empty() {
        return Err(ValidationError::InvalidCheckoutUrl {
            field,
            reason: "missing",
        });
    }
    if !template.starts_with("https://") && !template.starts_with("http://") {
        return Err(ValidationError::InvalidCheckoutUrl {
            field,
            reason: "must be an http(s) URL",
        });
    }
    if !template.contains(RESERVATION_PLACEHOLDER) {
        return Err(ValidationError::InvalidCheckoutUrl {
            field,
            reason: "must contain {reservation_id}",
        });
    }
    Ok(())
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_api_base_url: default_api_base_url(),
            success_url_template: String::new(),
            cancel_url_template: String::new(),
            currency: default_currency(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}
