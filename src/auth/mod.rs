//! Session lifecycle management.
//!
//! This module provides:
//! - `SessionManager`: the single authority over the current session
//! - `Session` / `AuthState`: the credential bundle and its derived state
//! - `Credentials`: normalized, locally-validated sign-in/sign-up input
//! - `AuthEvent` / `Subscription`: state change notifications
//!
//! Sessions are persisted through a `SessionStore` and refreshed shortly
//! before expiry by a background task owned by the manager.

pub mod credentials;
pub mod error;
pub mod events;
pub mod manager;
pub mod session;

pub use credentials::Credentials;
pub use error::AuthError;
pub use events::{AuthEvent, Subscription};
pub use manager::{RemoteChange, SessionManager, SignUpOutcome};
pub use session::{AuthState, Session, UserRecord};
