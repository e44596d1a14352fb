//! Client adapter for the remote identity service.
//!
//! Translates session manager calls into HTTP requests and normalizes the
//! service's response shapes (an immediate session object, a wrapped session,
//! or a raw token pair) into one internal representation.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::session::DEFAULT_EXPIRES_IN_SECS;
use crate::auth::{Session, UserRecord};
use crate::config::AuthConfig;

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Normalized result of an identity call that may or may not establish a
/// session. Sign-up with email confirmation enabled returns `UserOnly`.
#[derive(Debug, Clone)]
pub enum AuthPayload {
    Session(Session),
    UserOnly(Option<UserRecord>),
}

impl AuthPayload {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthPayload::Session(s) => Some(s),
            AuthPayload::UserOnly(_) => None,
        }
    }
}

/// The identity endpoints the session manager depends on. `IdentityClient`
/// is the production implementation; tests inject fakes.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<AuthPayload, ApiError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthPayload, ApiError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, ApiError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ApiError>;

    async fn recover(&self, email: &str) -> Result<(), ApiError>;
}

/// Raw response from the identity service's auth endpoints. Depending on the
/// endpoint and API version the session may arrive flat, wrapped under
/// `session`, or not at all (user-only).
#[derive(Debug, Deserialize, Default)]
struct AuthResponseRaw {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Absolute expiry as unix seconds, when the service supplies it.
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    user: Option<UserRecord>,
    #[serde(default)]
    session: Option<Box<AuthResponseRaw>>,
}

/// Resolve a raw response into a normalized payload. A session is only
/// produced when both tokens are present; expiry falls back to
/// `now + expires_in` (or the service default) when `expires_at` is absent.
fn normalize_payload(raw: AuthResponseRaw, now: DateTime<Utc>) -> AuthPayload {
    // Wrapped shape: prefer the inner session, keep the outer user if the
    // inner one is missing.
    if let Some(inner) = raw.session {
        let outer_user = raw.user;
        return match normalize_payload(*inner, now) {
            AuthPayload::Session(mut s) => {
                if s.user.is_none() {
                    s.user = outer_user;
                }
                AuthPayload::Session(s)
            }
            AuthPayload::UserOnly(inner_user) => AuthPayload::UserOnly(inner_user.or(outer_user)),
        };
    }

    match (raw.access_token, raw.refresh_token) {
        (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
            let expires_at = raw
                .expires_at
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .unwrap_or_else(|| {
                    now + chrono::Duration::seconds(
                        raw.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
                    )
                });
            let mut session = Session::new(access, refresh, expires_at, raw.user);
            if let Some(token_type) = raw.token_type {
                session.token_type = token_type;
            }
            AuthPayload::Session(session)
        }
        _ => AuthPayload::UserOnly(raw.user),
    }
}

/// Client for the identity service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl IdentityClient {
    pub fn new(config: &AuthConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn base_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref key) = self.api_key {
            let value = header::HeaderValue::from_str(key)
                .map_err(|_| ApiError::BadRequest("invalid api key header".to_string()))?;
            headers.insert("apikey", value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning a parsed error if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn post_auth(&self, url: &str, body: &Value) -> Result<AuthPayload, ApiError> {
        let response = self
            .client
            .post(url)
            .headers(self.base_headers()?)
            .json(body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let raw: AuthResponseRaw = response.json().await?;
        Ok(normalize_payload(raw, Utc::now()))
    }
}

#[async_trait]
impl IdentityApi for IdentityClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<AuthPayload, ApiError> {
        let url = self.url("/signup");
        let mut body = serde_json::json!({
            "email": email,
            "password": password,
        });
        if let Some(meta) = metadata {
            body["data"] = Value::Object(meta.clone());
        }

        debug!(email, "Sending sign-up request");
        self.post_auth(&url, &body).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthPayload, ApiError> {
        let url = self.url("/token?grant_type=password");
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        debug!(email, "Sending password grant request");
        self.post_auth(&url, &body).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, ApiError> {
        let url = self.url("/token?grant_type=refresh_token");
        let body = serde_json::json!({ "refresh_token": refresh_token });

        debug!("Sending refresh grant request");
        self.post_auth(&url, &body).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
        let url = self.url("/logout");
        let response = self
            .client
            .post(&url)
            .headers(self.base_headers()?)
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn recover(&self, email: &str) -> Result<(), ApiError> {
        let url = self.url("/recover");
        let body = serde_json::json!({ "email": email });
        let response = self
            .client
            .post(&url)
            .headers(self.base_headers()?)
            .json(&body)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AuthResponseRaw {
        serde_json::from_str(json).expect("Failed to parse test JSON")
    }

    #[test]
    fn test_normalize_raw_token_pair_computes_expiry() {
        let raw = parse(
            r#"{"access_token":"at","refresh_token":"rt","expires_in":3600,
                "token_type":"bearer","user":{"id":"u1","email":"a@b.c"}}"#,
        );
        let now = Utc::now();
        match normalize_payload(raw, now) {
            AuthPayload::Session(s) => {
                assert_eq!(s.access_token, "at");
                assert_eq!(s.refresh_token, "rt");
                assert_eq!(s.token_type, "bearer");
                assert_eq!((s.expires_at - now).num_seconds(), 3600);
                assert_eq!(s.user.unwrap().id, "u1");
            }
            AuthPayload::UserOnly(_) => panic!("expected a session"),
        }
    }

    #[test]
    fn test_normalize_prefers_absolute_expiry() {
        let raw = parse(
            r#"{"access_token":"at","refresh_token":"rt",
                "expires_in":3600,"expires_at":1900000000}"#,
        );
        match normalize_payload(raw, Utc::now()) {
            AuthPayload::Session(s) => {
                assert_eq!(s.expires_at.timestamp(), 1_900_000_000);
            }
            AuthPayload::UserOnly(_) => panic!("expected a session"),
        }
    }

    #[test]
    fn test_normalize_wrapped_session_shape() {
        let raw = parse(
            r#"{"user":{"id":"outer"},
                "session":{"access_token":"at","refresh_token":"rt","expires_in":60}}"#,
        );
        match normalize_payload(raw, Utc::now()) {
            AuthPayload::Session(s) => {
                // Inner session carried no user; the outer one is kept
                assert_eq!(s.user.unwrap().id, "outer");
            }
            AuthPayload::UserOnly(_) => panic!("expected a session"),
        }
    }

    #[test]
    fn test_normalize_user_only_response() {
        let raw = parse(r#"{"user":{"id":"u1","email":"a@b.c"}}"#);
        match normalize_payload(raw, Utc::now()) {
            AuthPayload::UserOnly(Some(user)) => assert_eq!(user.id, "u1"),
            other => panic!("expected user-only payload, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_missing_refresh_token_is_not_a_session() {
        let raw = parse(r#"{"access_token":"at","expires_in":3600,"user":{"id":"u1"}}"#);
        assert!(normalize_payload(raw, Utc::now()).session().is_none());
    }

    #[test]
    fn test_normalize_empty_tokens_are_not_a_session() {
        let raw = parse(r#"{"access_token":"","refresh_token":"rt"}"#);
        assert!(normalize_payload(raw, Utc::now()).session().is_none());
    }

    #[test]
    fn test_normalize_defaults_expiry_when_unspecified() {
        let raw = parse(r#"{"access_token":"at","refresh_token":"rt"}"#);
        let now = Utc::now();
        match normalize_payload(raw, now) {
            AuthPayload::Session(s) => {
                assert_eq!((s.expires_at - now).num_seconds(), DEFAULT_EXPIRES_IN_SECS);
            }
            AuthPayload::UserOnly(_) => panic!("expected a session"),
        }
    }
}
