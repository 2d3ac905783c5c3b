//! Session credential persistence.
//!
//! The credential format belongs to the protocol client; it is stored
//! verbatim as JSON.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// File name of the stored credentials inside the auth directory.
pub const CREDS_FILE: &str = "creds.json";

/// Errors that can occur while loading or saving credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to access credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credentials file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Hook called on every credential update, plus the initial load.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the stored credentials, or `None` before the first pairing.
    async fn load(&self) -> Result<Option<Value>, CredentialError>;

    /// Replaces the stored credentials.
    async fn save(&self, credentials: &Value) -> Result<(), CredentialError>;
}

/// Keeps credentials in `<auth_dir>/creds.json`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store inside the given auth directory.
    #[must_use]
    pub fn new(auth_dir: impl AsRef<Path>) -> Self {
        Self {
            path: auth_dir.as_ref().join(CREDS_FILE),
        }
    }

    /// Path of the credentials file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Value>, CredentialError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored credentials at {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, credentials: &Value) -> Result<(), CredentialError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        // Write then rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(credentials)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Credentials saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn temp_auth_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "wa_autoreply_bot_{name}_{}",
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let store = FileCredentialStore::new(temp_auth_dir("missing"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = temp_auth_dir("roundtrip");
        let store = FileCredentialStore::new(&dir);
        let creds = json!({"me": {"id": "123@s.whatsapp.net"}, "registered": true});

        store.save(&creds).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(creds));
        assert!(store.path().ends_with(CREDS_FILE));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let dir = temp_auth_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CREDS_FILE), "{not json").unwrap();

        let store = FileCredentialStore::new(&dir);
        assert!(matches!(store.load().await, Err(CredentialError::Parse(_))));

        let _ = std::fs::remove_dir_all(dir);
    }
}
