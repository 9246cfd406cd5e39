//! # Sync Coordinator
//!
//! Top-level driver for synchronization passes over a root directory.
//!
//! ## Overview
//!
//! Every direct subdirectory of the root is one folder, and each folder maps
//! to one remote album. The `SyncCoordinator` owns the ledgers
//! ([`SyncState`](crate::SyncState) and [`FailureRegistry`]), the album
//! directory and the upload pipeline, and feeds them files one at a time.
//!
//! ## Workflow
//!
//! ### Full pass
//! 1. List top-level folders in name order (hidden ones skipped)
//! 2. Resolve the folder's album; on failure skip the folder
//! 3. Feed every visible file of the folder through the pipeline
//!
//! ### Retry pass
//! 1. Re-read the failure registry from disk
//! 2. For each parked entry of the requested kinds, check the folder still
//!    exists and re-resolve its album
//! 3. Re-run the pipeline for every parked file that still exists
//!
//! Cancellation is checked between files, so a pass never stops halfway
//! through a commit.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncConfig, SyncCoordinator, SyncPaths};
//! use tokio_util::sync::CancellationToken;
//!
//! let paths = SyncPaths::new("/photos", "upload_state.json", "failed_uploads.json");
//! let mut coordinator =
//!     SyncCoordinator::open(paths, library, editor, SyncConfig::default()).await?;
//!
//! let report = coordinator.run_full_pass(&CancellationToken::new()).await?;
//! println!("{}", report);
//! ```

use crate::albums::AlbumDirectory;
use crate::audit::{AuditSummary, DateAudit};
use crate::error::{Result, SyncError};
use crate::failures::{FailureKind, FailureRegistry};
use crate::persistence::JsonStore;
use crate::pipeline::{FileOutcome, FileReport, FileTask, Ledger, PipelineConfig, UploadPipeline};
use crate::reconcile::{DateReconciler, DEFAULT_METADATA_EXTENSIONS};
use crate::retry::RetryPolicy;
use crate::state::SyncState;
use bridge_traits::library::PhotoLibrary;
use bridge_traits::metadata::MetadataEditor;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default delay between recovery loop iterations
pub const DEFAULT_RECOVERY_INTERVAL: Duration = Duration::from_secs(10);

/// Sync engine tunables
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Report what would happen without writing anything
    pub dry_run: bool,

    /// Reconcile file dates with folder names before upload
    pub fix_dates: bool,

    /// Retry policy for album, upload and commit calls
    pub retry: RetryPolicy,

    /// Pause after a rate-limited commit
    pub rate_limit_pause: Duration,

    /// Delay between recovery loop iterations
    pub recovery_interval: Duration,

    /// Files larger than this are parked as `TooLarge`
    pub max_upload_bytes: u64,

    /// Extensions with editable capture metadata
    pub metadata_extensions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            dry_run: false,
            fix_dates: false,
            retry: pipeline.retry,
            rate_limit_pause: pipeline.rate_limit_pause,
            recovery_interval: DEFAULT_RECOVERY_INTERVAL,
            max_upload_bytes: pipeline.max_upload_bytes,
            metadata_extensions: DEFAULT_METADATA_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Filesystem locations a coordinator works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPaths {
    pub root: PathBuf,
    pub state_file: PathBuf,
    pub failures_file: PathBuf,
}

impl SyncPaths {
    pub fn new(
        root: impl Into<PathBuf>,
        state_file: impl Into<PathBuf>,
        failures_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            state_file: state_file.into(),
            failures_file: failures_file.into(),
        }
    }
}

/// Counters for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub folders_processed: usize,
    pub folders_skipped: usize,
    pub uploaded: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub date_fixes: usize,
    /// Dry run only
    pub would_upload: usize,
}

impl SyncReport {
    pub fn record(&mut self, file: &FileReport) {
        match file.outcome {
            FileOutcome::AlreadyUploaded => self.skipped_existing += 1,
            FileOutcome::Uploaded { .. } => self.uploaded += 1,
            FileOutcome::WouldUpload => self.would_upload += 1,
            FileOutcome::Failed(_) => self.failed += 1,
        }
        if file.date_corrected {
            self.date_fixes += 1;
        }
    }

    pub fn merge(&mut self, other: &SyncReport) {
        self.folders_processed += other.folders_processed;
        self.folders_skipped += other.folders_skipped;
        self.uploaded += other.uploaded;
        self.skipped_existing += other.skipped_existing;
        self.failed += other.failed;
        self.date_fixes += other.date_fixes;
        self.would_upload += other.would_upload;
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "folders: {} processed, {} skipped; files: {} uploaded, {} already present, {} failed; {} dates fixed",
            self.folders_processed,
            self.folders_skipped,
            self.uploaded,
            self.skipped_existing,
            self.failed,
            self.date_fixes
        )?;
        if self.would_upload > 0 {
            write!(f, "; {} would upload", self.would_upload)?;
        }
        Ok(())
    }
}

/// Orchestrates sync passes over one root directory
pub struct SyncCoordinator {
    root: PathBuf,
    config: SyncConfig,
    pipeline: UploadPipeline,
    albums: AlbumDirectory,
    ledger: Ledger,
}

impl SyncCoordinator {
    /// Validate the root and load both ledgers.
    ///
    /// In dry-run mode the ledgers are read but never written.
    pub async fn open(
        paths: SyncPaths,
        library: Arc<dyn PhotoLibrary>,
        editor: Arc<dyn MetadataEditor>,
        config: SyncConfig,
    ) -> Result<Self> {
        let is_dir = tokio::fs::metadata(&paths.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(SyncError::InvalidRoot(paths.root));
        }
        let root = tokio::fs::canonicalize(&paths.root).await?;

        let (state_store, failures_store) = if config.dry_run {
            (
                JsonStore::read_only(&paths.state_file),
                JsonStore::read_only(&paths.failures_file),
            )
        } else {
            (
                JsonStore::new(&paths.state_file),
                JsonStore::new(&paths.failures_file),
            )
        };

        let state = SyncState::load(state_store).await?;
        let failures = FailureRegistry::load(failures_store).await?;

        let reconciler = DateReconciler::new(editor, config.dry_run)
            .with_extensions(config.metadata_extensions.iter());
        let pipeline = UploadPipeline::new(
            library.clone(),
            reconciler,
            PipelineConfig {
                retry: config.retry,
                rate_limit_pause: config.rate_limit_pause,
                max_upload_bytes: config.max_upload_bytes,
                dry_run: config.dry_run,
            },
        );
        let albums = AlbumDirectory::new(library, config.retry, config.dry_run);

        info!(
            root = %root.display(),
            folders = state.len(),
            dry_run = config.dry_run,
            fix_dates = config.fix_dates,
            "Sync coordinator ready"
        );

        Ok(Self {
            root,
            config,
            pipeline,
            albums,
            ledger: Ledger { state, failures },
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Push every folder under the root.
    #[instrument(skip(self, cancel), fields(root = %self.root.display()))]
    pub async fn run_full_pass(&mut self, cancel: &CancellationToken) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for (folder, folder_path) in list_folders(&self.root).await? {
            check_cancelled(cancel, &report)?;
            info!(folder = %folder, "Processing folder");

            match self
                .albums
                .resolve(&folder, &folder_path, &mut self.ledger.state)
                .await
            {
                Ok(_) => {}
                Err(e @ SyncError::AlbumResolution { .. }) => {
                    error!(folder = %folder, error = %e, "Skipping folder");
                    report.folders_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }

            let files = match list_files(&folder_path).await {
                Ok(files) => files,
                Err(e) => {
                    error!(folder = %folder, error = %e, "Cannot list folder, skipping");
                    report.folders_skipped += 1;
                    continue;
                }
            };

            let mut completed = true;
            for path in files {
                check_cancelled(cancel, &report)?;
                let task = FileTask::from_path(&folder, &folder_path, &path);
                match self
                    .pipeline
                    .process(&task, self.config.fix_dates, &mut self.ledger, &mut self.albums)
                    .await
                {
                    Ok(file) => report.record(&file),
                    Err(e @ SyncError::AlbumResolution { .. }) => {
                        error!(folder = %folder, error = %e, "Album lost, skipping rest of folder");
                        completed = false;
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            if completed {
                report.folders_processed += 1;
            } else {
                report.folders_skipped += 1;
            }
        }

        info!(%report, "Full pass finished");
        Ok(report)
    }

    /// One explicit pass over files parked as `UploadError` or
    /// `AddToAlbumError`.
    pub async fn run_retry_pass(&mut self, cancel: &CancellationToken) -> Result<SyncReport> {
        let mut retried = HashSet::new();
        let report = self
            .retry_parked(&FailureKind::retry_eligible(false), &mut retried, cancel)
            .await?;
        info!(%report, "Retry pass finished");
        Ok(report)
    }

    /// Re-drive parked files of `kinds`.
    ///
    /// `retried` holds `(folder, file)` pairs that were retried and are still
    /// parked; they are skipped. Pairs that succeed are removed from it.
    pub async fn retry_parked(
        &mut self,
        kinds: &[FailureKind],
        retried: &mut HashSet<(String, String)>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        self.ledger.failures.reload().await?;
        let mut report = SyncReport::default();

        for &kind in kinds {
            for (parked_folder, entry) in self.ledger.failures.snapshot(kind) {
                check_cancelled(cancel, &report)?;

                let pending: Vec<&String> = entry
                    .files
                    .iter()
                    .filter(|f| !retried.contains(&(parked_folder.clone(), (*f).clone())))
                    .collect();
                if pending.is_empty() {
                    continue;
                }

                if !entry.path.is_dir() {
                    warn!(folder = %parked_folder, path = %entry.path.display(), "Parked folder no longer exists");
                    report.folders_skipped += 1;
                    continue;
                }

                // The ledger may know this path under another folder name
                let folder = self
                    .ledger
                    .state
                    .folder_for_path(&entry.path)
                    .unwrap_or(parked_folder.as_str())
                    .to_string();

                match self
                    .albums
                    .resolve(&folder, &entry.path, &mut self.ledger.state)
                    .await
                {
                    Ok(_) => {}
                    Err(e @ SyncError::AlbumResolution { .. }) => {
                        error!(folder = %folder, error = %e, "Skipping parked folder");
                        report.folders_skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                }

                let mut completed = true;
                for file_name in pending {
                    check_cancelled(cancel, &report)?;
                    let task = FileTask::new(&folder, &entry.path, file_name);
                    if !task.path.is_file() {
                        warn!(path = %task.path.display(), "Parked file is missing, leaving it parked");
                        continue;
                    }

                    match self.retry_file(kind, &task, &mut report).await {
                        Ok(()) => {}
                        Err(e @ SyncError::AlbumResolution { .. }) => {
                            error!(folder = %folder, error = %e, "Album lost, skipping rest of folder");
                            completed = false;
                            break;
                        }
                        Err(e) => return Err(e),
                    }

                    if folder != parked_folder
                        && self.ledger.state.is_uploaded(&folder, file_name)
                        && !self.config.dry_run
                    {
                        for stale in FailureKind::ALL.into_iter().filter(|k| k.is_active()) {
                            self.ledger
                                .failures
                                .remove(stale, &parked_folder, file_name)
                                .await?;
                        }
                    }

                    let key = (parked_folder.clone(), file_name.clone());
                    let still_parked = kinds.iter().any(|k| {
                        self.ledger.failures.contains(*k, &parked_folder, file_name)
                            || self.ledger.failures.contains(*k, &folder, file_name)
                    });
                    if still_parked {
                        retried.insert(key);
                    } else {
                        retried.remove(&key);
                    }
                }

                if completed {
                    report.folders_processed += 1;
                } else {
                    report.folders_skipped += 1;
                }
            }
        }

        debug!(%report, "Parked files retried");
        Ok(report)
    }

    async fn retry_file(&mut self, kind: FailureKind, task: &FileTask, report: &mut SyncReport) -> Result<()> {
        if kind == FailureKind::ExifErrors {
            match self
                .pipeline
                .reconciler()
                .reconcile_file(&task.path, &task.folder, &task.folder_path, &mut self.ledger.failures)
                .await
            {
                Ok(outcome) if outcome.is_correction() => report.date_fixes += 1,
                Ok(_) => {}
                Err(e @ SyncError::Persistence { .. }) => return Err(e),
                Err(e) => warn!(path = %task.path.display(), error = %e, "Date reconciliation failed"),
            }
        }

        let file = self
            .pipeline
            .process(task, false, &mut self.ledger, &mut self.albums)
            .await?;
        report.record(&file);
        Ok(())
    }

    /// Check file dates against folder names across the whole tree.
    ///
    /// Without `apply` the anomalies are written to `report_file`; with it
    /// they are fixed in place and no report is written.
    pub async fn audit_dates(&mut self, report_file: &Path, apply: bool) -> Result<AuditSummary> {
        let audit = DateAudit::new(self.pipeline.reconciler());
        let findings = audit.scan(&self.root).await?;

        let fixed = if apply {
            audit.apply(&findings, &mut self.ledger.failures).await?
        } else {
            audit.write_report(report_file, &findings).await?;
            0
        };

        let summary = AuditSummary {
            anomalies: findings.len(),
            fixed,
        };
        info!(anomalies = summary.anomalies, fixed = summary.fixed, "Date audit finished");
        Ok(summary)
    }
}

fn check_cancelled(cancel: &CancellationToken, report: &SyncReport) -> Result<()> {
    if cancel.is_cancelled() {
        warn!(%report, "Pass cancelled");
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Direct subdirectories of `root`, by name
async fn list_folders(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut folders = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        let path = entry.path();
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
            folders.push((name, path));
        }
    }
    folders.sort();
    Ok(folders)
}

/// Visible regular files directly inside `folder`, by name
async fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(folder).await?;
    while let Some(entry) = entries.next_entry().await? {
        if is_hidden(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
