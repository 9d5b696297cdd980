//! Contact snapshot captured at booking time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email pattern compiles")
});

// Optional leading +, then 7 to 20 digits with spaces, dashes, dots or parentheses.
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ().\-]{7,20}$").expect("phone pattern compiles"));

/// Name, email and phone of the person the booking is for.
///
/// Stored on the reservation so later profile edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ContactSnapshot {
    /// Validates and normalizes raw contact fields.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::empty_field("name"));
        }

        let email = email.into().trim().to_string();
        if email.is_empty() {
            return Err(ValidationError::empty_field("email"));
        }
        if !EMAIL_PATTERN.is_match(&email) {
            return Err(ValidationError::invalid_format("email", "not a valid email address"));
        }

        let phone = phone.into().trim().to_string();
        if phone.is_empty() {
            return Err(ValidationError::empty_field("phone"));
        }
        let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
        if !PHONE_PATTERN.is_match(&phone) || digits < 7 {
            return Err(ValidationError::invalid_format("phone", "not a valid phone number"));
        }

        Ok(Self { name, email, phone })
    }
}
