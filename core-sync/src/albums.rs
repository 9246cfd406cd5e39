//! # Album Directory
//!
//! Maps a local folder name to the remote album holding its files.
//!
//! Resolution order:
//!
//! 1. the folder's [`SyncState`] record
//! 2. the title cache filled by an earlier remote listing
//! 3. a full remote listing (once per process), filling the cache
//! 4. remote creation, recorded in [`SyncState`]
//!
//! Listing and creation go through the [`RetryPolicy`]. When every attempt
//! fails the error is returned and the caller skips the folder.

use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;
use crate::state::SyncState;
use bridge_traits::library::PhotoLibrary;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Longest album title the remote accepts, in characters
pub const MAX_ALBUM_TITLE_CHARS: usize = 100;

/// Album title for a folder name
pub fn album_title(folder: &str) -> String {
    folder.chars().take(MAX_ALBUM_TITLE_CHARS).collect()
}

pub struct AlbumDirectory {
    library: Arc<dyn PhotoLibrary>,
    retry: RetryPolicy,
    dry_run: bool,
    /// Remote title to album id
    cache: HashMap<String, String>,
    listed: bool,
}

impl AlbumDirectory {
    pub fn new(library: Arc<dyn PhotoLibrary>, retry: RetryPolicy, dry_run: bool) -> Self {
        Self {
            library,
            retry,
            dry_run,
            cache: HashMap::new(),
            listed: false,
        }
    }

    /// Album id for `folder`, creating the album if it does not exist.
    ///
    /// Returns `Ok(None)` only in dry-run mode, when the album would have
    /// been created.
    #[instrument(skip(self, folder_path, state))]
    pub async fn resolve(
        &mut self,
        folder: &str,
        folder_path: &Path,
        state: &mut SyncState,
    ) -> Result<Option<String>> {
        if let Some(album_id) = state.album_id(folder) {
            let album_id = album_id.to_string();
            state.set_album(folder, &album_id, folder_path).await?;
            return Ok(Some(album_id));
        }

        let title = album_title(folder);

        if !self.listed && !self.cache.contains_key(&title) {
            match self.list_remote(folder).await {
                Ok(()) => {}
                Err(e) if self.dry_run => {
                    // Listing is not retried again this run; unknown titles
                    // are reported as would-create
                    warn!(error = %e, "Dry run: cannot list remote albums");
                    self.listed = true;
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(album_id) = self.cache.get(&title).cloned() {
            info!(album_id = %album_id, "Reusing existing remote album");
            state.set_album(folder, &album_id, folder_path).await?;
            return Ok(Some(album_id));
        }

        if self.dry_run {
            info!(title = %title, "Dry run: would create album");
            return Ok(None);
        }

        let library: &dyn PhotoLibrary = self.library.as_ref();
        let requested = title.as_str();
        let album_id = self
            .retry
            .run("create album", move || library.create_album(requested))
            .await
            .map_err(|e| SyncError::AlbumResolution {
                folder: folder.to_string(),
                message: e.to_string(),
            })?;

        info!(album_id = %album_id, title = %title, "Album created");
        self.cache.insert(title, album_id.clone());
        state.set_album(folder, &album_id, folder_path).await?;
        Ok(Some(album_id))
    }

    /// Forget `folder`'s album after the remote reported it missing.
    ///
    /// The record is dropped from state and cache, so the next
    /// [`resolve`](Self::resolve) creates a replacement.
    pub async fn purge(&mut self, folder: &str, state: &mut SyncState) -> Result<Option<String>> {
        let removed = state.remove(folder).await?.map(|r| r.album_id);
        if let Some(ref stale) = removed {
            self.cache.retain(|_, id| id != stale);
            warn!(folder = %folder, album_id = %stale, "Purged stale album");
        }
        self.cache.remove(&album_title(folder));
        Ok(removed)
    }

    async fn list_remote(&mut self, folder: &str) -> Result<()> {
        let library: &dyn PhotoLibrary = self.library.as_ref();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let token = page_token.clone();
            let (albums, next) = self
                .retry
                .run("list albums", move || library.list_albums(token.clone()))
                .await
                .map_err(|e| SyncError::AlbumResolution {
                    folder: folder.to_string(),
                    message: e.to_string(),
                })?;

            pages += 1;
            for album in albums {
                self.cache.entry(album.title).or_insert(album.id);
            }

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        self.listed = true;
        debug!(pages = pages, albums = self.cache.len(), "Remote albums listed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::JsonStore;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::library::{CommitStatus, RemoteAlbum};
    use mockall::mock;
    use std::time::Duration;
    use tempfile::TempDir;

    mock! {
        Library {}

        #[async_trait]
        impl PhotoLibrary for Library {
            async fn create_album(&self, title: &str) -> BridgeResult<String>;
            async fn list_albums(&self, page_token: Option<String>)
                -> BridgeResult<(Vec<RemoteAlbum>, Option<String>)>;
            async fn upload(&self, path: &Path, file_name: &str) -> BridgeResult<String>;
            async fn commit(&self, album_id: &str, upload_token: &str, description: &str)
                -> BridgeResult<CommitStatus>;
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_secs(5))
    }

    async fn state(dir: &TempDir) -> SyncState {
        SyncState::load(JsonStore::new(dir.path().join("state.json")))
            .await
            .unwrap()
    }

    fn album(id: &str, title: &str) -> RemoteAlbum {
        RemoteAlbum {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn test_state_record_wins() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir).await;
        state.set_album("2021", "from-state", dir.path()).await.unwrap();

        let mut library = MockLibrary::new();
        library.expect_list_albums().times(0);
        library.expect_create_album().times(0);

        let mut albums = AlbumDirectory::new(Arc::new(library), policy(), false);
        let id = albums.resolve("2021", dir.path(), &mut state).await.unwrap();
        assert_eq!(id.as_deref(), Some("from-state"));
    }

    #[tokio::test]
    async fn test_paginated_listing_then_cache() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir).await;

        let mut library = MockLibrary::new();
        library
            .expect_list_albums()
            .withf(|token| token.is_none())
            .times(1)
            .returning(|_| Ok((vec![album("a1", "2020")], Some("p2".to_string()))));
        library
            .expect_list_albums()
            .withf(|token| token.as_deref() == Some("p2"))
            .times(1)
            .returning(|_| Ok((vec![album("a2", "2021")], None)));
        library
            .expect_create_album()
            .withf(|title| title == "2022")
            .times(1)
            .returning(|_| Ok("a3".to_string()));

        let mut albums = AlbumDirectory::new(Arc::new(library), policy(), false);

        let id = albums.resolve("2021", dir.path(), &mut state).await.unwrap();
        assert_eq!(id.as_deref(), Some("a2"));
        assert_eq!(state.album_id("2021"), Some("a2"));

        // Second folder: served from the cache, no relisting
        let id = albums.resolve("2020", dir.path(), &mut state).await.unwrap();
        assert_eq!(id.as_deref(), Some("a1"));

        let id = albums.resolve("2022", dir.path(), &mut state).await.unwrap();
        assert_eq!(id.as_deref(), Some("a3"));
    }

    #[tokio::test]
    async fn test_long_titles_are_truncated() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir).await;
        let folder: String = "é".repeat(150);

        let mut library = MockLibrary::new();
        library.expect_list_albums().returning(|_| Ok((vec![], None)));
        library
            .expect_create_album()
            .withf(|title| title.chars().count() == MAX_ALBUM_TITLE_CHARS)
            .times(1)
            .returning(|_| Ok("long".to_string()));

        let mut albums = AlbumDirectory::new(Arc::new(library), policy(), false);
        let id = albums.resolve(&folder, dir.path(), &mut state).await.unwrap();
        assert_eq!(id.as_deref(), Some("long"));
        assert_eq!(state.album_id(&folder), Some("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_failure_after_retries() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir).await;

        let mut library = MockLibrary::new();
        library.expect_list_albums().returning(|_| Ok((vec![], None)));
        library
            .expect_create_album()
            .times(5)
            .returning(|_| Err(BridgeError::OperationFailed("503".to_string())));

        let mut albums = AlbumDirectory::new(Arc::new(library), policy(), false);
        let result = albums.resolve("2021", dir.path(), &mut state).await;

        assert!(matches!(result, Err(SyncError::AlbumResolution { .. })));
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_never_creates() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir).await;

        let mut library = MockLibrary::new();
        library.expect_list_albums().returning(|_| Ok((vec![], None)));
        library.expect_create_album().times(0);

        let mut albums = AlbumDirectory::new(Arc::new(library), policy(), true);
        let id = albums.resolve("2021", dir.path(), &mut state).await.unwrap();
        assert!(id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_survives_listing_failure() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir).await;

        let mut library = MockLibrary::new();
        library
            .expect_list_albums()
            .times(5)
            .returning(|_| Err(BridgeError::Unauthorized("no token".to_string())));
        library.expect_create_album().times(0);

        let mut albums = AlbumDirectory::new(Arc::new(library), policy(), true);
        let first = albums.resolve("2021", dir.path(), &mut state).await.unwrap();
        assert!(first.is_none());

        // Not listed again for the next folder
        let second = albums.resolve("2022", dir.path(), &mut state).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_failure_skips_folder() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir).await;

        let mut library = MockLibrary::new();
        library
            .expect_list_albums()
            .times(5)
            .returning(|_| Err(BridgeError::OperationFailed("503".to_string())));
        library.expect_create_album().times(0);

        let mut albums = AlbumDirectory::new(Arc::new(library), policy(), false);
        let result = albums.resolve("2021", dir.path(), &mut state).await;
        assert!(matches!(result, Err(SyncError::AlbumResolution { .. })));
    }

    #[tokio::test]
    async fn test_purge_forces_new_album() {
        let dir = TempDir::new().unwrap();
        let mut state = state(&dir).await;

        let mut library = MockLibrary::new();
        library
            .expect_list_albums()
            .times(1)
            .returning(|_| Ok((vec![album("old", "2021")], None)));
        library
            .expect_create_album()
            .times(1)
            .returning(|_| Ok("new".to_string()));

        let mut albums = AlbumDirectory::new(Arc::new(library), policy(), false);
        let id = albums.resolve("2021", dir.path(), &mut state).await.unwrap();
        assert_eq!(id.as_deref(), Some("old"));

        let purged = albums.purge("2021", &mut state).await.unwrap();
        assert_eq!(purged.as_deref(), Some("old"));
        assert!(state.album_id("2021").is_none());

        let id = albums.resolve("2021", dir.path(), &mut state).await.unwrap();
        assert_eq!(id.as_deref(), Some("new"));
        assert_eq!(state.album_id("2021"), Some("new"));
    }
}
