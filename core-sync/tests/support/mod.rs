//! In-memory collaborators for driving the engine end to end.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::library::{CommitStatus, PhotoLibrary, RemoteAlbum};
use bridge_traits::metadata::MetadataEditor;
use chrono::NaiveDateTime;
use core_sync::{SyncConfig, SyncCoordinator, SyncPaths};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

#[derive(Default)]
struct LibraryState {
    albums: Vec<RemoteAlbum>,
    deleted: HashSet<String>,
    next_id: u32,
    create_calls: Vec<String>,
    list_calls: usize,
    uploads: Vec<String>,
    commits: Vec<(String, String)>,
    upload_failures: HashMap<String, usize>,
    commit_script: VecDeque<CommitStatus>,
    listing_rejected: bool,
}

/// Photo library fake with call counters and scripted failures
#[derive(Default)]
pub struct FakeLibrary {
    state: Mutex<LibraryState>,
}

impl FakeLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_album(&self, id: &str, title: &str) {
        self.state.lock().unwrap().albums.push(RemoteAlbum {
            id: id.to_string(),
            title: title.to_string(),
        });
    }

    /// Make the album disappear: commits against it answer "not found"
    pub fn delete_album(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.albums.retain(|a| a.id != id);
        state.deleted.insert(id.to_string());
    }

    /// Fail the next `times` uploads of `file_name`
    pub fn fail_uploads(&self, file_name: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .upload_failures
            .insert(file_name.to_string(), times);
    }

    /// Reject every album listing, as the service does without a valid token
    pub fn reject_listing(&self) {
        self.state.lock().unwrap().listing_rejected = true;
    }

    /// Answer the next commits with `statuses`, then succeed
    pub fn script_commits(&self, statuses: Vec<CommitStatus>) {
        self.state.lock().unwrap().commit_script.extend(statuses);
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().create_calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn uploads(&self) -> Vec<String> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// `(album_id, description)` per commit call
    pub fn commits(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().commits.clone()
    }
}

#[async_trait]
impl PhotoLibrary for FakeLibrary {
    async fn create_album(&self, title: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("album-{}", state.next_id);
        state.create_calls.push(title.to_string());
        state.albums.push(RemoteAlbum {
            id: id.clone(),
            title: title.to_string(),
        });
        Ok(id)
    }

    async fn list_albums(
        &self,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteAlbum>, Option<String>)> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.listing_rejected {
            return Err(BridgeError::Unauthorized("invalid bearer token".to_string()));
        }
        // Two albums per page
        let start: usize = page_token.as_deref().unwrap_or("0").parse().unwrap();
        let page: Vec<RemoteAlbum> = state.albums.iter().skip(start).take(2).cloned().collect();
        let next = (start + 2 < state.albums.len()).then(|| (start + 2).to_string());
        Ok((page, next))
    }

    async fn upload(&self, path: &Path, file_name: &str) -> Result<String> {
        assert!(path.is_file(), "uploading missing file {}", path.display());
        let mut state = self.state.lock().unwrap();
        state.uploads.push(file_name.to_string());
        if let Some(remaining) = state.upload_failures.get_mut(file_name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BridgeError::OperationFailed("connection reset".to_string()));
            }
        }
        Ok(format!("token-{}", file_name))
    }

    async fn commit(
        &self,
        album_id: &str,
        _upload_token: &str,
        description: &str,
    ) -> Result<CommitStatus> {
        let mut state = self.state.lock().unwrap();
        state
            .commits
            .push((album_id.to_string(), description.to_string()));
        if let Some(status) = state.commit_script.pop_front() {
            return Ok(status);
        }
        if state.deleted.contains(album_id) {
            return Ok(CommitStatus::AlbumNotFound);
        }
        Ok(CommitStatus::Created {
            media_item_id: Some(format!("item-{}", description)),
        })
    }
}

#[derive(Default)]
struct EditorState {
    capture_times: HashMap<PathBuf, NaiveDateTime>,
    writes: Vec<(PathBuf, NaiveDateTime)>,
    fail_writes: bool,
}

/// Metadata editor fake that records every write
#[derive(Default)]
pub struct RecordingEditor {
    state: Mutex<EditorState>,
}

impl RecordingEditor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_capture_time(&self, path: &Path, time: NaiveDateTime) {
        self.state
            .lock()
            .unwrap()
            .capture_times
            .insert(path.to_path_buf(), time);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn writes(&self) -> Vec<(PathBuf, NaiveDateTime)> {
        self.state.lock().unwrap().writes.clone()
    }
}

#[async_trait]
impl MetadataEditor for RecordingEditor {
    async fn read_capture_time(&self, path: &Path) -> Result<Option<NaiveDateTime>> {
        Ok(self.state.lock().unwrap().capture_times.get(path).copied())
    }

    async fn write_timestamps(&self, path: &Path, timestamp: NaiveDateTime) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(BridgeError::OperationFailed("exiftool exited with 1".to_string()));
        }
        state.writes.push((path.to_path_buf(), timestamp));
        state.capture_times.insert(path.to_path_buf(), timestamp);
        Ok(())
    }
}

/// Temporary photo root next to its ledger files
pub struct Workspace {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("photos");
        std::fs::create_dir(&root).unwrap();
        let root = root.canonicalize().unwrap();
        Self { dir, root }
    }

    /// Create `folder` holding `files` (a few bytes each); returns its path
    pub fn folder(&self, folder: &str, files: &[&str]) -> PathBuf {
        let path = self.root.join(folder);
        std::fs::create_dir_all(&path).unwrap();
        for file in files {
            std::fs::write(path.join(file), b"jpeg bytes").unwrap();
        }
        path
    }

    pub fn state_file(&self) -> PathBuf {
        self.dir.path().join("upload_state.json")
    }

    pub fn failures_file(&self) -> PathBuf {
        self.dir.path().join("failed_uploads.json")
    }

    pub fn paths(&self) -> SyncPaths {
        SyncPaths::new(&self.root, self.state_file(), self.failures_file())
    }

    pub async fn open(
        &self,
        library: &Arc<FakeLibrary>,
        editor: &Arc<RecordingEditor>,
        config: SyncConfig,
    ) -> SyncCoordinator {
        SyncCoordinator::open(self.paths(), library.clone(), editor.clone(), config)
            .await
            .unwrap()
    }
}

/// Engine config with short delays
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        retry: core_sync::RetryPolicy::new(5, Duration::from_millis(10)),
        ..SyncConfig::default()
    }
}
