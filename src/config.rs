//! Configuration for wiring a session manager.
//!
//! Holds the identity service location, the API key sent with every request,
//! and where the session cache lives on disk. The store directory defaults
//! to `<platform cache dir>/atelier/auth`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for the default store directory path
const APP_NAME: &str = "atelier";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Base URL of the identity service, e.g. `https://id.example.com/auth/v1`.
    pub base_url: String,
    /// API key attached to every request, when the deployment requires one.
    pub api_key: Option<String>,
    /// Override for the session store directory.
    pub store_dir: Option<PathBuf>,
}

impl AuthConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            store_dir: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    /// Directory the file store writes under.
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("auth"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_store_dir_wins() {
        let config = AuthConfig::new("https://id.example.com").with_store_dir("/tmp/auth-test");
        assert_eq!(config.store_dir().unwrap(), PathBuf::from("/tmp/auth-test"));
    }

    #[test]
    fn test_builder_chain() {
        let config = AuthConfig::new("https://id.example.com").with_api_key("anon-key");
        assert_eq!(config.base_url, "https://id.example.com");
        assert_eq!(config.api_key.as_deref(), Some("anon-key"));
    }
}
