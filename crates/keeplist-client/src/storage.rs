//! Durable storage for the authenticated session.
//!
//! # Design
//! - The persisted document mirrors what survives a restart: token, username,
//!   and expiry. Validity is decided by the session layer, not here.
//! - A missing file is an empty session, never an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Session fields as written to durable storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedSession {
    /// Bearer token, when one was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Account name of the session owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Absolute expiry of the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    /// Whether nothing is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.token.is_none() && self.username.is_none() && self.expires_at.is_none()
    }
}

/// Backend that keeps the session across process restarts.
pub trait SessionStorage: Send + Sync {
    /// Read the stored session; an absent record yields the empty session.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend exists but cannot be read or parsed.
    fn load(&self) -> ClientResult<PersistedSession>;

    /// Replace the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    fn save(&self, session: &PersistedSession) -> ClientResult<()>;

    /// Remove every stored session attribute.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be cleared.
    fn clear(&self) -> ClientResult<()>;
}

/// JSON file storage, typically under the user's data directory.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    /// Store the session at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File backing this storage.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ClientError {
        ClientError::Storage {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> ClientResult<PersistedSession> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(PersistedSession::default());
            }
            Err(err) => return Err(self.io_error(err)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(PersistedSession::default());
        }
        serde_json::from_slice(&bytes).map_err(|source| ClientError::StorageFormat { source })
    }

    fn save(&self, session: &PersistedSession) -> ClientResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let json = serde_json::to_vec_pretty(session)
            .map_err(|source| ClientError::StorageFormat { source })?;
        fs::write(&self.path, json).map_err(|err| self.io_error(err))?;
        tracing::debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// In-process storage used by tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    inner: Mutex<PersistedSession>,
}

impl MemorySessionStorage {
    /// Start from a pre-populated session.
    #[must_use]
    pub const fn with_session(session: PersistedSession) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    /// Copy of what is currently stored.
    #[must_use]
    pub fn snapshot(&self) -> PersistedSession {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> ClientResult<PersistedSession> {
        Ok(self.snapshot())
    }

    fn save(&self, session: &PersistedSession) -> ClientResult<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = PersistedSession::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> PersistedSession {
        PersistedSession {
            token: Some("tok".to_string()),
            username: Some("alice".to_string()),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).single(),
        }
    }

    #[test]
    fn file_storage_missing_file_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = FileSessionStorage::new(dir.path().join("absent.json"));
        assert!(storage.load()?.is_empty());
        storage.clear()?;
        Ok(())
    }

    #[test]
    fn file_storage_persists_across_instances() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("session.json");
        FileSessionStorage::new(&path).save(&sample())?;

        let reopened = FileSessionStorage::new(&path);
        assert_eq!(reopened.load()?, sample());

        reopened.clear()?;
        assert!(!path.exists());
        assert!(reopened.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn file_storage_reports_corrupt_documents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        fs::write(&path, b"{not json")?;
        let err = FileSessionStorage::new(&path)
            .load()
            .expect_err("corrupt file should fail");
        assert!(matches!(err, ClientError::StorageFormat { .. }));
        Ok(())
    }

    #[test]
    fn memory_storage_round_trips_and_clears() -> anyhow::Result<()> {
        let storage = MemorySessionStorage::default();
        storage.save(&sample())?;
        assert_eq!(storage.load()?, sample());
        storage.clear()?;
        assert!(storage.snapshot().is_empty());
        Ok(())
    }
}
