use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;

/// Errors surfaced by session manager operations.
///
/// Everything a public operation can fail with lands in one of these
/// variants; nothing panics across the manager boundary.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Rejected locally before any network call was made.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The identity service rejected the request (non-2xx).
    #[error(transparent)]
    Remote(#[from] ApiError),

    /// The identity service answered 2xx but the response was unusable
    /// (e.g. no tokens returned on a token exchange).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The durable session store failed. Persistence is a convenience while
    /// the process is alive, so most call sites log this instead of failing.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Failure outside the other categories, e.g. the platform cache
    /// directory cannot be resolved when wiring the default file store.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AuthError {
    /// Map known remote error descriptions to user-facing messages.
    /// Unrecognized errors fall back to the raw description.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(msg) => msg.clone(),
            AuthError::Remote(api) => {
                let desc = api.description().to_lowercase();
                if desc.contains("invalid login credentials")
                    || matches!(api, ApiError::Unauthorized)
                {
                    "Invalid email or password".to_string()
                } else if desc.contains("email not confirmed") {
                    "Please confirm your email address before signing in".to_string()
                } else if matches!(api, ApiError::NetworkError(_)) {
                    "Network error - please check your connection and try again".to_string()
                } else if desc.contains("user already registered") {
                    "An account with this email already exists".to_string()
                } else {
                    api.description()
                }
            }
            AuthError::Protocol(_) => "Sign-in failed: no session returned".to_string(),
            AuthError::Persistence(_) => "Could not save your session on this device".to_string(),
            AuthError::Unexpected(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credentials_mapped_to_friendly_message() {
        let err = AuthError::Remote(ApiError::BadRequest(
            "Invalid login credentials".to_string(),
        ));
        assert_eq!(err.user_message(), "Invalid email or password");
    }

    #[test]
    fn test_unconfirmed_email_mapped() {
        let err = AuthError::Remote(ApiError::BadRequest("Email not confirmed".to_string()));
        assert!(err.user_message().contains("confirm your email"));
    }

    #[test]
    fn test_unrecognized_remote_error_falls_back_to_raw_message() {
        let err = AuthError::Remote(ApiError::ServerError {
            status: 500,
            message: "database connection lost".to_string(),
        });
        assert_eq!(err.user_message(), "database connection lost");
    }

    #[test]
    fn test_unexpected_error_passes_message_through() {
        let err = AuthError::Unexpected("cannot resolve session store dir: no cache dir".into());
        assert_eq!(
            err.user_message(),
            "cannot resolve session store dir: no cache dir"
        );
    }

    #[test]
    fn test_protocol_error_message() {
        let err = AuthError::Protocol("token exchange returned no refresh token".to_string());
        assert_eq!(err.user_message(), "Sign-in failed: no session returned");
    }
}
