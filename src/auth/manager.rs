//! The session manager: one authoritative session, all transitions
//! serialized, every transition persisted and broadcast.
//!
//! All mutating operations queue on a single async lock, so two concurrent
//! sign-ins cannot interleave. Per transition the order is fixed: issue the
//! persistence write, update the in-memory state and snapshot, then notify
//! subscribers. Persistence failures are logged and never block the
//! in-memory transition - the store is a convenience while the process is
//! alive, not the source of truth.

use std::sync::{Arc, Mutex as StdMutex};

use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthPayload, IdentityApi, IdentityClient};
use crate::config::AuthConfig;
use crate::store::{FileStore, SessionStore};

use super::credentials::Credentials;
use super::error::AuthError;
use super::events::{self, AuthEvent, SharedSubscribers, Subscription};
use super::session::{AuthState, Session, UserRecord};

/// Delay before retrying a refresh that failed transiently (network or 5xx).
const REFRESH_RETRY_SECS: u64 = 30;

/// Result of a successful sign-up. The identity service may require email
/// confirmation, in which case no session exists yet - that is still a
/// success, distinct from any failure.
#[derive(Debug)]
pub enum SignUpOutcome {
    SessionEstablished(Session),
    ConfirmationRequired(Option<UserRecord>),
}

/// Authoritative session change pushed from outside a local call, e.g. a
/// token refreshed by the background task or a sign-out performed elsewhere.
#[derive(Debug)]
pub enum RemoteChange {
    TokenRefreshed(Session),
    UserUpdated(UserRecord),
    SignedOut,
}

struct ManagerState {
    session: Option<Session>,
    bootstrapped: bool,
}

struct Inner {
    api: Arc<dyn IdentityApi>,
    store: Arc<dyn SessionStore>,
    /// Serializes all transitions; held across each operation's I/O.
    state: AsyncMutex<ManagerState>,
    /// Read-only snapshot for `current_state`; never blocks on the op lock.
    snapshot: StdMutex<AuthState>,
    subscribers: SharedSubscribers,
    refresh_task: StdMutex<Option<JoinHandle<()>>>,
    auto_refresh: bool,
}

/// Session lifecycle manager.
/// Clone is cheap - the state lives behind a shared inner.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Build a manager over injected collaborators, with automatic token
    /// refresh enabled.
    pub fn new(api: Arc<dyn IdentityApi>, store: Arc<dyn SessionStore>) -> Self {
        Self::build(api, store, true)
    }

    /// Build a manager that never refreshes on its own, for hosts that
    /// drive refresh themselves.
    pub fn without_auto_refresh(api: Arc<dyn IdentityApi>, store: Arc<dyn SessionStore>) -> Self {
        Self::build(api, store, false)
    }

    /// Convenience wiring: reqwest identity client plus a file store under
    /// the configured directory.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let api = IdentityClient::new(config)?;
        let dir = config
            .store_dir()
            .map_err(|e| AuthError::Unexpected(format!("cannot resolve session store dir: {e}")))?;
        let store = FileStore::new(dir);
        Ok(Self::new(Arc::new(api), Arc::new(store)))
    }

    fn build(api: Arc<dyn IdentityApi>, store: Arc<dyn SessionStore>, auto_refresh: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                state: AsyncMutex::new(ManagerState {
                    session: None,
                    bootstrapped: false,
                }),
                snapshot: StdMutex::new(AuthState::loading()),
                subscribers: SharedSubscribers::default(),
                refresh_task: StdMutex::new(None),
                auto_refresh,
            }),
        }
    }

    /// Determine the initial auth state: restore a cached session if one is
    /// still usable, refreshing it once when expired. Runs its logic exactly
    /// once per manager; later calls return the current state unchanged.
    pub async fn bootstrap(&self) -> AuthState {
        let mut state = self.inner.state.lock().await;
        if state.bootstrapped {
            return self.current_state();
        }
        state.bootstrapped = true;

        let cached = match self.inner.store.load().await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Failed to read cached session, starting unauthenticated");
                None
            }
        };

        let restored = match cached {
            Some(session) if session.is_valid() => {
                debug!("Restored cached session");
                Some(session)
            }
            Some(session) if session.has_tokens() => {
                // Expired but refreshable: one attempt, then give up
                match self.inner.api.refresh(&session.refresh_token).await {
                    Ok(payload) => match payload.session() {
                        Some(fresh) => {
                            let mut fresh = fresh.clone();
                            if fresh.user.is_none() {
                                fresh.user = session.user;
                            }
                            Some(fresh)
                        }
                        None => None,
                    },
                    Err(e) => {
                        warn!(error = %e, "Could not refresh expired cached session");
                        None
                    }
                }
            }
            _ => None,
        };

        match restored {
            Some(session) => {
                self.commit(&mut state, Some(session), Some(AuthEvent::SignedIn))
                    .await;
            }
            None => {
                // Clears any stale entry; nothing to broadcast, the manager
                // was never authenticated
                self.commit(&mut state, None, None).await;
            }
        }

        info!(
            authenticated = self.current_state().is_authenticated,
            "Bootstrap complete"
        );
        self.current_state()
    }

    /// Register a new account. Validates locally before any network call.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<SignUpOutcome, AuthError> {
        let creds = match metadata {
            Some(meta) => Credentials::with_metadata(email, password, meta),
            None => Credentials::new(email, password),
        };
        creds.validate_for_sign_up()?;

        let mut state = self.inner.state.lock().await;
        let payload = self
            .inner
            .api
            .sign_up(creds.email(), creds.password(), creds.metadata())
            .await?;

        match payload {
            AuthPayload::Session(session) if session.has_tokens() => {
                info!(email = creds.email(), "Signed up with immediate session");
                self.commit(&mut state, Some(session.clone()), Some(AuthEvent::SignedIn))
                    .await;
                Ok(SignUpOutcome::SessionEstablished(session))
            }
            AuthPayload::Session(_) => Err(AuthError::Protocol(
                "sign-up returned a session without tokens".to_string(),
            )),
            AuthPayload::UserOnly(user) => {
                info!(email = creds.email(), "Signed up, confirmation required");
                Ok(SignUpOutcome::ConfirmationRequired(user))
            }
        }
    }

    /// Exchange credentials for a session. The response must carry both
    /// tokens; a 2xx without them is a protocol error, not a partial success.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let creds = Credentials::new(email, password);
        creds.validate_for_sign_in()?;

        let mut state = self.inner.state.lock().await;
        let payload = self
            .inner
            .api
            .sign_in_with_password(creds.email(), creds.password())
            .await?;

        let session = match payload {
            AuthPayload::Session(session) if session.has_tokens() => session,
            _ => {
                return Err(AuthError::Protocol(
                    "token exchange returned no session".to_string(),
                ))
            }
        };

        info!(email = creds.email(), "Signed in");
        self.commit(&mut state, Some(session.clone()), Some(AuthEvent::SignedIn))
            .await;
        Ok(session)
    }

    /// End the session. The local transition is authoritative: in-memory
    /// state is cleared and SignedOut broadcast even when the remote call or
    /// the store clear fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let mut state = self.inner.state.lock().await;
        let Some(session) = state.session.clone() else {
            // Not authenticated in memory, but a cached entry may still
            // exist (e.g. sign-out before bootstrap). Drop it so a later
            // bootstrap cannot resurrect the session; nothing to broadcast.
            self.commit(&mut state, None, None).await;
            return Ok(());
        };

        if let Err(e) = self.inner.api.sign_out(&session.access_token).await {
            warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
        }

        info!("Signed out");
        self.commit(&mut state, None, Some(AuthEvent::SignedOut))
            .await;
        Ok(())
    }

    /// Ask the identity service to start password recovery for `email`.
    /// Fire-and-forget: no session state changes.
    pub async fn reset_password_request(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }
        self.inner.api.recover(&email).await?;
        info!(email = %email, "Password recovery requested");
        Ok(())
    }

    /// Exchange the refresh token for a new session. A refresh the remote
    /// authority rejects outright signs the session out locally, since it
    /// can no longer be renewed.
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let mut state = self.inner.state.lock().await;
        let Some(current) = state.session.clone() else {
            return Err(AuthError::Validation("No session to refresh".to_string()));
        };

        match self.inner.api.refresh(&current.refresh_token).await {
            Ok(payload) => {
                let Some(fresh) = payload.session() else {
                    return Err(AuthError::Protocol(
                        "refresh returned no session".to_string(),
                    ));
                };
                let mut fresh = fresh.clone();
                if fresh.user.is_none() {
                    fresh.user = current.user.clone();
                }
                debug!("Session refreshed");
                self.commit(
                    &mut state,
                    Some(fresh.clone()),
                    Some(AuthEvent::TokenRefreshed),
                )
                .await;
                Ok(fresh)
            }
            Err(e @ (ApiError::Unauthorized | ApiError::BadRequest(_))) => {
                warn!(error = %e, "Refresh token rejected, signing out locally");
                self.commit(&mut state, None, Some(AuthEvent::SignedOut))
                    .await;
                Err(AuthError::Remote(e))
            }
            Err(e) => Err(AuthError::Remote(e)),
        }
    }

    /// Apply an authoritative session change pushed by the remote authority.
    /// Updates persisted and in-memory state, then notifies subscribers.
    pub async fn apply_remote_change(&self, change: RemoteChange) {
        let mut state = self.inner.state.lock().await;
        match change {
            RemoteChange::TokenRefreshed(session) if session.has_tokens() => {
                let mut session = session;
                if session.user.is_none() {
                    session.user = state.session.as_ref().and_then(|s| s.user.clone());
                }
                self.commit(&mut state, Some(session), Some(AuthEvent::TokenRefreshed))
                    .await;
            }
            RemoteChange::TokenRefreshed(_) => {
                warn!("Ignoring remote session update without tokens");
            }
            RemoteChange::UserUpdated(user) => {
                if let Some(mut session) = state.session.clone() {
                    session.user = Some(user);
                    self.commit(&mut state, Some(session), Some(AuthEvent::UserUpdated))
                        .await;
                }
            }
            RemoteChange::SignedOut => {
                if state.session.is_some() {
                    info!("Signed out by remote authority");
                    self.commit(&mut state, None, Some(AuthEvent::SignedOut))
                        .await;
                }
            }
        }
    }

    /// Non-blocking snapshot of the current auth state. Safe to call from
    /// subscriber callbacks.
    pub fn current_state(&self) -> AuthState {
        self.inner
            .snapshot
            .lock()
            .expect("snapshot lock poisoned")
            .clone()
    }

    /// Register a callback for every subsequent transition. Delivery is
    /// synchronous and ordered by registration.
    pub fn subscribe(
        &self,
        callback: impl Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    ) -> Subscription {
        events::subscribe(&self.inner.subscribers, callback)
    }

    /// Apply a transition: persist first, then swap the in-memory session
    /// and snapshot, manage the refresh task, and finally broadcast. Callers
    /// hold the op lock, so subscribers never observe a half-applied state.
    async fn commit(
        &self,
        state: &mut ManagerState,
        session: Option<Session>,
        event: Option<AuthEvent>,
    ) {
        match &session {
            Some(s) => {
                if let Err(e) = self.inner.store.save(s).await {
                    warn!(error = %e, "Failed to persist session, continuing in memory");
                }
            }
            None => {
                if let Err(e) = self.inner.store.clear().await {
                    warn!(error = %e, "Failed to clear persisted session, continuing in memory");
                }
            }
        }

        state.session = session.clone();
        *self
            .inner
            .snapshot
            .lock()
            .expect("snapshot lock poisoned") = AuthState::from_session(session.as_ref());

        if session.is_some() {
            self.start_refresh_task();
        } else {
            self.stop_refresh_task();
        }

        if let Some(event) = event {
            events::notify(&self.inner.subscribers, event, session.as_ref());
        }
    }

    fn start_refresh_task(&self) {
        if !self.inner.auto_refresh {
            return;
        }
        let mut guard = self
            .inner
            .refresh_task
            .lock()
            .expect("refresh task lock poisoned");
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let manager = self.clone();
        *guard = Some(tokio::spawn(async move {
            manager.refresh_loop().await;
        }));
    }

    fn stop_refresh_task(&self) {
        let handle = self
            .inner
            .refresh_task
            .lock()
            .expect("refresh task lock poisoned")
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Background task: sleep until the session enters its refresh window,
    /// then exchange the refresh token. Transient failures retry on a fixed
    /// interval; a rejection has already signed the session out.
    async fn refresh_loop(self) {
        loop {
            let wait_ms = {
                let state = self.inner.state.lock().await;
                match &state.session {
                    Some(session) => session.time_until_refresh().num_milliseconds(),
                    None => return,
                }
            };
            if wait_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(wait_ms as u64)).await;

                // The session may have been replaced mid-sleep by a fresh
                // sign-in; reschedule against whatever is current instead
                // of refreshing it early.
                let due = {
                    let state = self.inner.state.lock().await;
                    match &state.session {
                        Some(session) => session.needs_refresh(),
                        None => return,
                    }
                };
                if !due {
                    continue;
                }
            }

            match self.refresh_session().await {
                Ok(_) => {}
                Err(AuthError::Remote(
                    ApiError::NetworkError(_) | ApiError::ServerError { .. } | ApiError::RateLimited,
                )) => {
                    debug!("Transient refresh failure, will retry");
                    tokio::time::sleep(std::time::Duration::from_secs(REFRESH_RETRY_SECS)).await;
                }
                Err(_) => return,
            }
        }
    }
}
