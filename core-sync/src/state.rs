//! # Sync State
//!
//! Durable ledger of which remote album each local folder maps to and which
//! files of that folder were fully uploaded and committed.
//!
//! The ledger is loaded once, pruned of folders that vanished from disk, and
//! flushed after every mutation. A filename present in
//! [`AlbumRecord::uploaded_files`] is never uploaded again.

use crate::error::Result;
use crate::persistence::JsonStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Remote album and committed files of one local folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub album_id: String,
    pub path: PathBuf,
    /// Older ledgers call this `files`
    #[serde(default, alias = "files")]
    pub uploaded_files: BTreeSet<String>,
}

impl AlbumRecord {
    pub fn new(album_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            album_id: album_id.into(),
            path: path.into(),
            uploaded_files: BTreeSet::new(),
        }
    }
}

/// Folder name to [`AlbumRecord`] ledger with write-through persistence
#[derive(Debug)]
pub struct SyncState {
    store: JsonStore,
    albums: BTreeMap<String, AlbumRecord>,
}

impl SyncState {
    /// Load the ledger and drop records whose folder no longer exists.
    pub async fn load(store: JsonStore) -> Result<Self> {
        let mut albums: BTreeMap<String, AlbumRecord> = store.load().await?;

        let before = albums.len();
        albums.retain(|folder, record| {
            let exists = record.path.exists();
            if !exists {
                info!(folder = %folder, path = %record.path.display(), "Pruning state for missing folder");
            }
            exists
        });

        let state = Self { store, albums };
        if state.albums.len() != before {
            state.persist().await?;
        }

        debug!(folders = state.albums.len(), "Sync state loaded");
        Ok(state)
    }

    pub fn record(&self, folder: &str) -> Option<&AlbumRecord> {
        self.albums.get(folder)
    }

    pub fn album_id(&self, folder: &str) -> Option<&str> {
        self.albums.get(folder).map(|r| r.album_id.as_str())
    }

    pub fn is_uploaded(&self, folder: &str, file_name: &str) -> bool {
        self.albums
            .get(folder)
            .is_some_and(|r| r.uploaded_files.contains(file_name))
    }

    /// Folder whose record points at `path`
    pub fn folder_for_path(&self, path: &Path) -> Option<&str> {
        self.albums
            .iter()
            .find(|(_, record)| record.path == path)
            .map(|(folder, _)| folder.as_str())
    }

    pub fn folders(&self) -> impl Iterator<Item = (&str, &AlbumRecord)> {
        self.albums.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    /// Bind a folder to an album.
    ///
    /// Rebinding to the same album only refreshes the path. Binding to a
    /// different album replaces the record, uploaded files included.
    pub async fn set_album(&mut self, folder: &str, album_id: &str, path: &Path) -> Result<()> {
        match self.albums.get_mut(folder) {
            Some(record) if record.album_id == album_id => {
                if record.path == path {
                    return Ok(());
                }
                record.path = path.to_path_buf();
            }
            _ => {
                self.albums
                    .insert(folder.to_string(), AlbumRecord::new(album_id, path));
            }
        }
        self.persist().await
    }

    /// Record a committed file. Returns `false` if the folder has no record.
    pub async fn mark_uploaded(&mut self, folder: &str, file_name: &str) -> Result<bool> {
        let Some(record) = self.albums.get_mut(folder) else {
            return Ok(false);
        };
        if record.uploaded_files.insert(file_name.to_string()) {
            self.persist().await?;
        }
        Ok(true)
    }

    /// Forget a folder's record
    pub async fn remove(&mut self, folder: &str) -> Result<Option<AlbumRecord>> {
        let removed = self.albums.remove(folder);
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    pub async fn persist(&self) -> Result<()> {
        self.store.save(&self.albums).await
    }
}
