//! atelier-auth - client-side authentication session management.
//!
//! One `SessionManager` owns the authentication lifecycle for an
//! application: sign-up, sign-in, sign-out, password recovery, session
//! persistence across restarts, automatic token refresh, and synchronous
//! broadcast of every state change to subscribers.
//!
//! The manager is constructed explicitly at the application's composition
//! root and injected into consumers; its collaborators - the remote
//! identity service (`IdentityApi`) and the durable session cache
//! (`SessionStore`) - are trait objects, so hosts and tests can substitute
//! their own.
//!
//! ```no_run
//! use std::sync::Arc;
//! use atelier_auth::{AuthConfig, SessionManager};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AuthConfig::new("https://id.example.com/auth/v1").with_api_key("anon-key");
//! let auth = SessionManager::from_config(&config)?;
//!
//! let subscription = auth.subscribe(|event, _session| {
//!     println!("auth state changed: {event:?}");
//! });
//!
//! auth.bootstrap().await;
//! auth.sign_in("user@example.com", "secret1").await?;
//! assert!(auth.current_state().is_authenticated);
//!
//! auth.sign_out().await?;
//! subscription.unsubscribe();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod store;

pub use api::{ApiError, AuthPayload, IdentityApi, IdentityClient};
pub use auth::{
    AuthError, AuthEvent, AuthState, RemoteChange, Session, SessionManager, SignUpOutcome,
    Subscription, UserRecord,
};
pub use config::AuthConfig;
pub use store::{FileStore, MemoryStore, SessionStore, StoreError};
