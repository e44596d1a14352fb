use serde_json::{Map, Value};

use super::error::AuthError;

/// Minimum password length accepted before any network call is made.
/// Matches the identity service's own sign-up policy.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Transient sign-in/sign-up input. Never persisted anywhere.
#[derive(Debug, Clone)]
pub struct Credentials {
    email: String,
    password: String,
    metadata: Option<Map<String, Value>>,
}

impl Credentials {
    /// Build credentials, normalizing the email (trimmed, lower-cased)
    /// before it ever reaches the wire.
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            password: password.to_string(),
            metadata: None,
        }
    }

    pub fn with_metadata(email: &str, password: &str, metadata: Map<String, Value>) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::new(email, password)
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    /// Sign-in only requires that both fields are present.
    pub fn validate_for_sign_in(&self) -> Result<(), AuthError> {
        if self.email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }
        Ok(())
    }

    /// Sign-up additionally enforces the minimum password length.
    pub fn validate_for_sign_up(&self) -> Result<(), AuthError> {
        self.validate_for_sign_in()?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let creds = Credentials::new("  USER@Example.com ", "secret1");
        assert_eq!(creds.email(), "user@example.com");
    }

    #[test]
    fn test_sign_in_requires_both_fields() {
        assert!(Credentials::new("", "pw").validate_for_sign_in().is_err());
        assert!(Credentials::new("a@b.c", "").validate_for_sign_in().is_err());
        assert!(Credentials::new("a@b.c", "pw").validate_for_sign_in().is_ok());
    }

    #[test]
    fn test_sign_up_enforces_password_length() {
        let short = Credentials::new("a@b.c", "abc");
        let err = short.validate_for_sign_up().unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let ok = Credentials::new("a@b.c", "secret1");
        assert!(ok.validate_for_sign_up().is_ok());
    }

    #[test]
    fn test_whitespace_only_email_rejected() {
        let creds = Credentials::new("   ", "secret1");
        assert!(creds.validate_for_sign_in().is_err());
    }
}
