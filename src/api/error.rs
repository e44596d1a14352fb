use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid credentials: {0}")]
    BadRequest(String),

    #[error("Unauthorized - token may be expired or revoked")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Too many requests - please wait before retrying")]
    RateLimited,

    #[error("Identity service error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {message}")]
    RequestFailed {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Machine-readable error body returned by the identity service.
/// Field names vary by endpoint and API version, so everything is optional.
#[derive(Debug, serde::Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Extract a human-readable description and optional error code from a
    /// non-2xx response body. Falls back to a generic message when the body
    /// carries nothing machine-readable.
    fn parse_body(status: u16, body: &str) -> (String, Option<String>) {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        let code = parsed.error_code.or_else(|| match parsed.code {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        });

        let message = parsed
            .error_description
            .or(parsed.msg)
            .or(parsed.message)
            .or(parsed.error)
            .unwrap_or_else(|| format!("request failed with status {}", status));

        (message, code)
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        let (message, code) = Self::parse_body(status.as_u16(), &truncated);
        match status.as_u16() {
            400 | 422 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError {
                status: status.as_u16(),
                message,
            },
            _ => ApiError::RequestFailed {
                status: status.as_u16(),
                code,
                message,
            },
        }
    }

    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest(_) => Some(400),
            ApiError::Unauthorized => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::RateLimited => Some(429),
            ApiError::ServerError { status, .. } => Some(*status),
            ApiError::RequestFailed { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
        }
    }

    /// Remote error code for programmatic branching, when the body carried one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::RequestFailed { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The remote authority's description of the failure.
    pub fn description(&self) -> String {
        match self {
            ApiError::BadRequest(m) | ApiError::AccessDenied(m) => m.clone(),
            ApiError::ServerError { message, .. } => message.clone(),
            ApiError::RequestFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_description_body() {
        let status = reqwest::StatusCode::from_u16(400).unwrap();
        let err = ApiError::from_status(
            status,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Invalid login credentials"));
    }

    #[test]
    fn test_parse_msg_body_with_code() {
        let status = reqwest::StatusCode::from_u16(410).unwrap();
        let err = ApiError::from_status(
            status,
            r#"{"msg":"Signups not allowed for this instance","error_code":"signup_disabled"}"#,
        );
        assert_eq!(err.status(), Some(410));
        assert_eq!(err.code(), Some("signup_disabled"));
        assert_eq!(err.description(), "Signups not allowed for this instance");
    }

    #[test]
    fn test_generic_fallback_for_empty_body() {
        let status = reqwest::StatusCode::from_u16(418).unwrap();
        let err = ApiError::from_status(status, "");
        assert_eq!(err.description(), "request failed with status 418");
    }

    #[test]
    fn test_non_json_body_falls_back() {
        let status = reqwest::StatusCode::from_u16(502).unwrap();
        let err = ApiError::from_status(status, "<html>Bad Gateway</html>");
        assert!(matches!(err, ApiError::ServerError { .. }));
    }

    #[test]
    fn test_server_error_preserves_actual_status() {
        let status = reqwest::StatusCode::from_u16(503).unwrap();
        let err = ApiError::from_status(status, r#"{"message":"maintenance"}"#);
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.description(), "maintenance");
    }

    #[test]
    fn test_body_truncation() {
        let long_body = "x".repeat(2000);
        let truncated = ApiError::truncate_body(&long_body);
        assert!(truncated.len() < 600);
        assert!(truncated.contains("truncated, 2000 total bytes"));
    }
}
