use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{SessionStore, StoreError, SESSION_KEY};
use crate::auth::Session;

/// File-backed session store: one pretty-printed JSON file named after the
/// session key, created on first save.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", SESSION_KEY))
    }

    fn read_file(path: &Path) -> Result<Option<Session>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        let session: Session = serde_json::from_str(&contents)?;
        Ok(Some(session))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load(&self) -> Result<Option<Session>, StoreError> {
        Self::read_file(&self.session_path())
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&path, contents)?;
        debug!(path = %path.display(), "Session written to store");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(&path)?;
            debug!(path = %path.display(), "Session cleared from store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRecord;
    use chrono::{Duration, Utc};

    fn sample_session() -> Session {
        Session::new(
            "access-token",
            "refresh-token",
            Utc::now() + Duration::hours(1),
            Some(UserRecord::with_email("u1", "user@example.com")),
        )
    }

    #[tokio::test]
    async fn test_missing_file_means_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let session = sample_session();
        store.save(&session).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "access-token");
        assert_eq!(loaded.refresh_token, "refresh-token");
        assert_eq!(loaded.user.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("auth"));
        store.save(&sample_session()).await.unwrap();
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.save(&sample_session()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());

        // Clearing an absent entry succeeds too
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(store.session_path(), "not json").unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Serde(_))));
    }
}
