//! Email address validation for login requests.

use regex::Regex;

use crate::config::ValidationConfig;

/// One `@`, no whitespace, non-empty local part, and a domain of at least
/// two non-empty dot-separated labels.
const DEFAULT_EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$";

pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "A valid email address is required";

pub struct EmailValidator {
    pattern: Regex,
    max_length: usize,
}

impl EmailValidator {
    pub fn new(config: &ValidationConfig) -> Result<Self, regex::Error> {
        let pattern = config
            .email_pattern
            .as_deref()
            .unwrap_or(DEFAULT_EMAIL_PATTERN);

        Ok(Self {
            pattern: Regex::new(pattern)?,
            max_length: config.max_email_length,
        })
    }

    /// Return every violated rule; empty means valid.
    ///
    /// The input is checked as given, without trimming or case folding.
    pub fn validate(&self, email: &str) -> Vec<String> {
        if email.trim().is_empty() {
            return vec![EMAIL_REQUIRED.to_string()];
        }

        let mut errors = Vec::new();
        if !self.pattern.is_match(email) {
            errors.push(EMAIL_INVALID.to_string());
        }
        if email.chars().count() > self.max_length {
            errors.push(format!("Email must not exceed {} characters", self.max_length));
        }
        errors
    }
}
