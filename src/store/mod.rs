//! Durable storage for the cached session.
//!
//! The session manager is the sole writer of a single namespaced entry
//! (`auth-session`) holding the JSON-serialized session. Absence of the
//! entry means "no cached session". `FileStore` is the production
//! implementation; `MemoryStore` backs tests and embedded use.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Session;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Fixed key under which the session is cached.
pub const SESSION_KEY: &str = "auth-session";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode cached session: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous, string-keyed durable store for the cached session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the cached session, `None` when nothing is cached.
    async fn load(&self) -> Result<Option<Session>, StoreError>;

    /// Write the session, replacing any previous entry.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Remove the entry. Clearing an absent entry is not an error.
    async fn clear(&self) -> Result<(), StoreError>;
}
