//! JSON Ledger Files
//!
//! Both durable ledgers (sync state and failure registry) are small JSON
//! documents rewritten in full after every mutation. A write goes to a
//! sibling `.tmp` file which is then renamed over the target, so a crash
//! mid-write leaves the previous version intact.

use crate::error::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Location and write policy of one ledger file
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
    persist: bool,
}

impl JsonStore {
    /// Store that reads and writes `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            persist: true,
        }
    }

    /// Store that reads `path` but never writes it (dry runs)
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            persist: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_persistent(&self) -> bool {
        self.persist
    }

    /// Load the document. A missing or blank file yields `T::default()`.
    pub async fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Ledger file absent, starting empty");
                return Ok(T::default());
            }
            Err(e) => return Err(SyncError::persistence(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&content).map_err(|e| SyncError::persistence(&self.path, e))
    }

    /// Rewrite the document atomically. No-op for read-only stores.
    pub async fn save<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        if !self.persist {
            trace!(path = %self.path.display(), "Read-only ledger, skipping write");
            return Ok(());
        }

        let json =
            serde_json::to_vec_pretty(value).map_err(|e| SyncError::persistence(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::persistence(&self.path, e))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| SyncError::persistence(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SyncError::persistence(&self.path, e))?;

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
