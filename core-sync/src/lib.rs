//! # Folder Sync Engine
//!
//! Pushes a local tree of photo folders into a remote photo library, one
//! album per folder, and keeps retrying whatever failed.
//!
//! ## Overview
//!
//! - Every file is uploaded at most once: committed filenames are recorded
//!   per folder in a durable ledger and skipped afterwards
//! - Failures are parked by kind in a durable registry and re-driven by an
//!   explicit retry pass or by the recovery loop
//! - File timestamps can be corrected from the date in the folder name
//!   before upload
//!
//! ## Components
//!
//! - **Date Reconciler** (`reconcile`, `date`): folder-name dates and timestamp correction
//! - **Failure Registry** (`failures`): parked failures by kind and folder
//! - **Album Directory** (`albums`): folder name to remote album, created on demand
//! - **Sync State** (`state`): albums and committed files per folder
//! - **Upload Pipeline** (`pipeline`): per-file transfer and commit protocol
//! - **Sync Coordinator** (`coordinator`): full and retry passes over a root
//! - **Recovery Loop** (`recovery`): periodic retry until cancelled
//! - **Date Audit** (`audit`): tree-wide date anomaly report

pub mod albums;
pub mod audit;
pub mod coordinator;
pub mod date;
pub mod error;
pub mod failures;
pub mod persistence;
pub mod pipeline;
pub mod reconcile;
pub mod recovery;
pub mod retry;
pub mod state;

pub use albums::{album_title, AlbumDirectory, MAX_ALBUM_TITLE_CHARS};
pub use audit::{AuditFinding, AuditSummary, DateAudit, DEFAULT_REPORT_FILE};
pub use coordinator::{SyncConfig, SyncCoordinator, SyncPaths, SyncReport};
pub use date::{derive_corrected_timestamp, DateSpec};
pub use error::{Result, SyncError};
pub use failures::{FailureEntry, FailureKind, FailureRegistry};
pub use persistence::JsonStore;
pub use pipeline::{
    FileOutcome, FileReport, FileStage, FileTask, Ledger, PipelineConfig, UploadPipeline,
};
pub use reconcile::{Correction, DateReconciler, MetadataEdit, ReconcileOutcome};
pub use recovery::RecoveryLoop;
pub use retry::RetryPolicy;
pub use state::{AlbumRecord, SyncState};

pub use tokio_util::sync::CancellationToken;
