//! HTTP client for the remote identity service.
//!
//! This module provides the `IdentityApi` trait describing the identity
//! endpoints the session manager needs (sign-up, password grant, refresh
//! grant, recovery, sign-out) and `IdentityClient`, the reqwest-backed
//! implementation. Heterogeneous response shapes are normalized into a
//! single `AuthPayload` at this boundary.

pub mod client;
pub mod error;

pub use client::{AuthPayload, IdentityApi, IdentityClient};
pub use error::ApiError;
