use std::sync::Mutex;

use async_trait::async_trait;

use super::{SessionStore, StoreError};
use crate::auth::Session;

/// In-process session store. Serializes through JSON like `FileStore` so the
/// same round-trip behavior is exercised.
#[derive(Default)]
pub struct MemoryStore {
    entry: Mutex<Option<String>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail, for exercising persistence-failure
    /// paths in tests.
    pub fn failing() -> Self {
        Self {
            entry: Mutex::new(None),
            fail_writes: true,
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self) -> Result<Option<Session>, StoreError> {
        let guard = self.entry.lock().expect("store lock poisoned");
        match guard.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        let raw = serde_json::to_string(session)?;
        *self.entry.lock().expect("store lock poisoned") = Some(raw);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        *self.entry.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}
