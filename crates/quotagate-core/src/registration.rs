//! Registration rules: email domain restriction and privileged-user assignment.

use crate::error::{QuotaGateError, Result};

/// Which configured group a newly confirmed user lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Default,
    Admin,
}

/// Compiled registration rules. All entries are stored lowercased.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRules {
    allowed_suffixes: Vec<String>,
    admin_emails: Vec<String>,
    admin_suffixes: Vec<String>,
}

impl RegistrationRules {
    /// An empty `allowed_suffixes` admits every address.
    pub fn new(allowed_suffixes: &[String], admin_emails: &[String], admin_suffixes: &[String]) -> Self {
        Self {
            allowed_suffixes: lower_all(allowed_suffixes),
            admin_emails: lower_all(admin_emails),
            admin_suffixes: lower_all(admin_suffixes),
        }
    }

    /// Normalize `email` and check it against the allowed suffixes.
    /// Returns the normalized address.
    pub fn validate_email(&self, email: &str) -> Result<String> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(QuotaGateError::RegistrationRejected(
                "An email address is required to register.".into(),
            ));
        }
        if self.allowed_suffixes.is_empty() || self.allowed_suffixes.iter().any(|s| email.ends_with(s.as_str())) {
            return Ok(email);
        }
        Err(QuotaGateError::RegistrationRejected(format!(
            "Registration is restricted to {} email addresses only.",
            self.allowed_suffixes.join(", ")
        )))
    }

    /// Group assignment for an already validated address.
    pub fn assign(&self, email: &str) -> Assignment {
        let email = normalize_email(email);
        if self.admin_emails.iter().any(|e| *e == email)
            || self.admin_suffixes.iter().any(|s| email.ends_with(s.as_str()))
        {
            Assignment::Admin
        } else {
            Assignment::Default
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn lower_all(v: &[String]) -> Vec<String> {
    v.iter().map(|s| normalize_email(s)).filter(|s| !s.is_empty()).collect()
}
