use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Buffer time before expiry to trigger refresh (60 seconds).
/// Refreshing inside this window avoids racing the remote expiry clock.
pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 60;

/// Default token lifetime when the remote supplies neither `expires_at`
/// nor `expires_in` (1 hour, the identity service's default).
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// User record attached to a session. The identity service returns an open
/// set of fields; only the identifier is guaranteed, the rest is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            extra: Map::new(),
        }
    }

    pub fn with_email(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
            extra: Map::new(),
        }
    }
}

/// An authenticated login: token pair, absolute expiry, and the user the
/// tokens were issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub user: Option<UserRecord>,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        user: Option<UserRecord>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            token_type: "bearer".to_string(),
            user,
        }
    }

    /// A session missing either token must never be treated as
    /// authenticated state or written to the store.
    pub fn has_tokens(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::seconds(TOKEN_REFRESH_BUFFER_SECS)
    }

    pub fn time_until_refresh(&self) -> Duration {
        self.expires_at - Duration::seconds(TOKEN_REFRESH_BUFFER_SECS) - Utc::now()
    }

    /// Check if session is usable (tokens present and not expired)
    pub fn is_valid(&self) -> bool {
        self.has_tokens() && !self.is_expired()
    }
}

/// Snapshot of authentication state handed to the rest of the application.
///
/// `is_loading` is true only before the first bootstrap determination;
/// `is_authenticated` requires both a live session and a known user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<UserRecord>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl AuthState {
    pub(crate) fn loading() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
        }
    }

    pub(crate) fn from_session(session: Option<&Session>) -> Self {
        let user = session.and_then(|s| s.user.clone());
        Self {
            is_authenticated: user.is_some() && session.is_some(),
            user,
            is_loading: false,
        }
    }
}
