//! # Upload Pipeline
//!
//! Drives one file through
//! `Pending -> DateFixed -> Transferred -> Committed`, or into a parked
//! failure.
//!
//! 1. **Admission**: a filename already in the folder's uploaded set is
//!    skipped.
//! 2. **Date reconciliation**, when enabled.
//! 3. **Transfer**: files above the size limit are parked as `TooLarge`
//!    without trying. Upload errors are retried, then parked as
//!    `UploadError`.
//! 4. **Commit** into the folder's album. A `429` earns one long pause and a
//!    repeat of the same call; a missing album is purged and replaced once.
//!    Anything else counts as a failed attempt; exhausting the attempts parks
//!    the file as `AddToAlbumError`.
//! 5. **Record**: the filename joins the uploaded set and any parked
//!    upload-path failure for it is cleared.

use crate::albums::AlbumDirectory;
use crate::error::{Result, SyncError};
use crate::failures::{FailureKind, FailureRegistry};
use crate::reconcile::{file_name_of, DateReconciler, ReconcileOutcome};
use crate::retry::RetryPolicy;
use crate::state::SyncState;
use bridge_traits::library::{CommitStatus, PhotoLibrary};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Pause after a `429` before repeating the commit
pub const DEFAULT_RATE_LIMIT_PAUSE: Duration = Duration::from_secs(65);

/// Largest file the remote accepts (10 GiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Mutable books a pass works against
#[derive(Debug)]
pub struct Ledger {
    pub state: SyncState,
    pub failures: FailureRegistry,
}

/// Progress of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Pending,
    DateFixed,
    Transferred,
    Committed,
    Failed(FailureKind),
}

impl FileStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStage::Committed | FileStage::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStage::Pending => "pending",
            FileStage::DateFixed => "date_fixed",
            FileStage::Transferred => "transferred",
            FileStage::Committed => "committed",
            FileStage::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStage::Failed(kind) => write!(f, "failed({})", kind),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A file to push, located by folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub folder: String,
    pub folder_path: PathBuf,
    pub path: PathBuf,
    pub file_name: String,
}

impl FileTask {
    pub fn new(folder: &str, folder_path: &Path, file_name: &str) -> Self {
        Self {
            folder: folder.to_string(),
            folder_path: folder_path.to_path_buf(),
            path: folder_path.join(file_name),
            file_name: file_name.to_string(),
        }
    }

    pub fn from_path(folder: &str, folder_path: &Path, path: &Path) -> Self {
        Self {
            folder: folder.to_string(),
            folder_path: folder_path.to_path_buf(),
            path: path.to_path_buf(),
            file_name: file_name_of(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Already committed in an earlier run
    AlreadyUploaded,
    Uploaded { media_item_id: Option<String> },
    /// Dry run: would have been uploaded
    WouldUpload,
    Failed(FailureKind),
}

impl FileOutcome {
    pub fn stage(&self) -> FileStage {
        match self {
            FileOutcome::AlreadyUploaded | FileOutcome::Uploaded { .. } => FileStage::Committed,
            FileOutcome::WouldUpload => FileStage::Pending,
            FileOutcome::Failed(kind) => FileStage::Failed(*kind),
        }
    }
}

/// Result of [`UploadPipeline::process`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub outcome: FileOutcome,
    pub date_corrected: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub rate_limit_pause: Duration,
    pub max_upload_bytes: u64,
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            rate_limit_pause: DEFAULT_RATE_LIMIT_PAUSE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            dry_run: false,
        }
    }
}

pub struct UploadPipeline {
    library: Arc<dyn PhotoLibrary>,
    reconciler: DateReconciler,
    config: PipelineConfig,
}

impl UploadPipeline {
    pub fn new(
        library: Arc<dyn PhotoLibrary>,
        reconciler: DateReconciler,
        config: PipelineConfig,
    ) -> Self {
        Self {
            library,
            reconciler,
            config,
        }
    }

    pub fn reconciler(&self) -> &DateReconciler {
        &self.reconciler
    }

    /// Push one file. Terminal per-file failures are parked and reported
    /// through [`FileOutcome::Failed`]; `Err` means the folder (album
    /// resolution) or the ledger itself failed.
    #[instrument(skip(self, task, ledger, albums), fields(folder = %task.folder, file = %task.file_name))]
    pub async fn process(
        &self,
        task: &FileTask,
        fix_dates: bool,
        ledger: &mut Ledger,
        albums: &mut AlbumDirectory,
    ) -> Result<FileReport> {
        let mut stage = FileStage::Pending;

        if ledger.state.is_uploaded(&task.folder, &task.file_name) {
            debug!("Already uploaded, skipping");
            if !self.config.dry_run {
                ledger
                    .failures
                    .clear_active(&task.folder, &task.file_name)
                    .await?;
            }
            return Ok(FileReport {
                outcome: FileOutcome::AlreadyUploaded,
                date_corrected: false,
            });
        }

        let mut date_corrected = false;
        if fix_dates {
            match self
                .reconciler
                .reconcile_file(&task.path, &task.folder, &task.folder_path, &mut ledger.failures)
                .await
            {
                Ok(outcome) => {
                    date_corrected = outcome.is_correction();
                    if !matches!(outcome, ReconcileOutcome::NoFolderDate) {
                        stage = FileStage::DateFixed;
                    }
                }
                Err(e @ SyncError::Persistence { .. }) => return Err(e),
                Err(e) => warn!(error = %e, "Date reconciliation failed, uploading as is"),
            }
        }

        if self.config.dry_run {
            info!(stage = %stage, "Dry run: would upload");
            return Ok(FileReport {
                outcome: FileOutcome::WouldUpload,
                date_corrected,
            });
        }

        let outcome = self.transfer_and_commit(task, ledger, albums).await?;
        debug!(stage = %outcome.stage(), "File processed");
        Ok(FileReport {
            outcome,
            date_corrected,
        })
    }

    async fn transfer_and_commit(
        &self,
        task: &FileTask,
        ledger: &mut Ledger,
        albums: &mut AlbumDirectory,
    ) -> Result<FileOutcome> {
        let size = match tokio::fs::metadata(&task.path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                error!(error = %e, "Cannot stat file");
                return self.park(FailureKind::UploadError, task, ledger).await;
            }
        };

        if size > self.config.max_upload_bytes {
            warn!(
                size = size,
                limit = self.config.max_upload_bytes,
                "File exceeds upload limit"
            );
            return self.park(FailureKind::TooLarge, task, ledger).await;
        }

        let mut album_id = self.album_for(task, ledger, albums).await?;

        let library: &dyn PhotoLibrary = self.library.as_ref();
        let path = task.path.as_path();
        let file_name = task.file_name.as_str();
        let upload_token = match self
            .config
            .retry
            .run("upload", move || library.upload(path, file_name))
            .await
        {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Upload failed");
                return self.park(FailureKind::UploadError, task, ledger).await;
            }
        };
        debug!(stage = %FileStage::Transferred, bytes = size, "Content uploaded");

        let mut attempts = 0u32;
        let mut paused = false;
        let mut replaced = false;

        loop {
            let failure = match library
                .commit(&album_id, &upload_token, &task.file_name)
                .await
            {
                Ok(CommitStatus::Created { media_item_id }) => {
                    return self.record_commit(task, ledger, media_item_id).await;
                }
                Ok(CommitStatus::RateLimited) if !paused => {
                    paused = true;
                    warn!(
                        pause_secs = self.config.rate_limit_pause.as_secs(),
                        "Rate limited, pausing before retrying commit"
                    );
                    tokio::time::sleep(self.config.rate_limit_pause).await;
                    continue;
                }
                Ok(CommitStatus::AlbumNotFound) if !replaced => {
                    replaced = true;
                    warn!(album_id = %album_id, "Album no longer exists, replacing it");
                    albums.purge(&task.folder, &mut ledger.state).await?;
                    album_id = match self.album_for(task, ledger, albums).await {
                        Ok(id) => id,
                        Err(e) => {
                            self.park(FailureKind::AddToAlbumError, task, ledger).await?;
                            return Err(e);
                        }
                    };
                    continue;
                }
                Ok(CommitStatus::RateLimited) => "still rate limited".to_string(),
                Ok(CommitStatus::AlbumNotFound) => "replacement album not found".to_string(),
                Ok(CommitStatus::Rejected { status, message }) => {
                    format!("rejected with {}: {}", status, message)
                }
                Err(e) => e.to_string(),
            };

            attempts += 1;
            if attempts >= self.config.retry.max_attempts {
                error!(attempts = attempts, error = %failure, "Commit failed");
                return self.park(FailureKind::AddToAlbumError, task, ledger).await;
            }
            warn!(
                attempt = attempts,
                max_attempts = self.config.retry.max_attempts,
                error = %failure,
                "Commit attempt failed, retrying"
            );
            tokio::time::sleep(self.config.retry.delay).await;
        }
    }

    async fn album_for(
        &self,
        task: &FileTask,
        ledger: &mut Ledger,
        albums: &mut AlbumDirectory,
    ) -> Result<String> {
        if let Some(id) = ledger.state.album_id(&task.folder) {
            return Ok(id.to_string());
        }
        albums
            .resolve(&task.folder, &task.folder_path, &mut ledger.state)
            .await?
            .ok_or_else(|| SyncError::AlbumResolution {
                folder: task.folder.clone(),
                message: "no album available".to_string(),
            })
    }

    async fn record_commit(
        &self,
        task: &FileTask,
        ledger: &mut Ledger,
        media_item_id: Option<String>,
    ) -> Result<FileOutcome> {
        if !ledger
            .state
            .mark_uploaded(&task.folder, &task.file_name)
            .await?
        {
            warn!("Committed file has no album record to note it in");
        }
        ledger
            .failures
            .clear_active(&task.folder, &task.file_name)
            .await?;

        info!(stage = %FileStage::Committed, media_item_id = ?media_item_id, "File uploaded");
        Ok(FileOutcome::Uploaded { media_item_id })
    }

    async fn park(&self, kind: FailureKind, task: &FileTask, ledger: &mut Ledger) -> Result<FileOutcome> {
        ledger
            .failures
            .reclassify(kind, &task.folder, &task.file_name, &task.folder_path)
            .await?;
        Ok(FileOutcome::Failed(kind))
    }
}
