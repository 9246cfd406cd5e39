//! # Date Reconciliation
//!
//! Moves a file's timestamps into the date named by its folder before
//! upload, so the remote library sorts it where the folder says it belongs.
//!
//! Two independent side effects are applied when a correction is needed:
//!
//! - embedded capture/create/modify tags are rewritten through the
//!   [`MetadataEditor`], for extensions that carry such tags. A failed edit
//!   parks the file under [`FailureKind::ExifErrors`]; an extension outside
//!   the editable set parks it under [`FailureKind::UnsupportedFormat`].
//! - filesystem access and modification times are set to the corrected
//!   value, for every file.
//!
//! In dry-run mode the correction is computed and logged, nothing is written.

use crate::date::{derive_corrected_timestamp, DateSpec};
use crate::error::Result;
use crate::failures::{FailureKind, FailureRegistry};
use bridge_traits::metadata::MetadataEditor;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use filetime::FileTime;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Extensions whose embedded capture time can be read and rewritten
pub const DEFAULT_METADATA_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "tif", "tiff", "heic", "heif", "cr2"];

/// What happened to the embedded metadata during a correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataEdit {
    Written,
    Failed,
    Unsupported,
}

/// A needed timestamp change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    pub original: NaiveDateTime,
    pub corrected: NaiveDateTime,
    /// The file's extension carries editable capture metadata
    pub editable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Folder name carries no date
    NoFolderDate,
    /// Timestamps already agree with the folder
    Unchanged,
    /// Dry run: the change that would have been applied
    WouldCorrect(Correction),
    Corrected {
        correction: Correction,
        metadata: MetadataEdit,
    },
}

impl ReconcileOutcome {
    pub fn is_correction(&self) -> bool {
        matches!(self, ReconcileOutcome::Corrected { .. })
    }
}

pub struct DateReconciler {
    editor: Arc<dyn MetadataEditor>,
    dry_run: bool,
    extensions: Vec<String>,
}

impl DateReconciler {
    pub fn new(editor: Arc<dyn MetadataEditor>, dry_run: bool) -> Self {
        Self {
            editor,
            dry_run,
            extensions: DEFAULT_METADATA_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }

    /// Replace the set of editable extensions (case-insensitive, no dot)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn supports_metadata(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|x| *x == e))
    }

    /// Timestamp the file currently claims: embedded capture time when
    /// readable, otherwise the filesystem modification time.
    pub async fn authoritative_timestamp(&self, path: &Path) -> Result<NaiveDateTime> {
        if self.supports_metadata(path) {
            match self.editor.read_capture_time(path).await {
                Ok(Some(captured)) => return Ok(captured),
                Ok(None) => debug!(path = %path.display(), "No embedded capture time"),
                Err(e) => debug!(path = %path.display(), error = %e, "Capture time unreadable"),
            }
        }

        let modified = tokio::fs::metadata(path).await?.modified()?;
        Ok(DateTime::<Local>::from(modified).naive_local())
    }

    /// Compute the correction for `path` without touching anything.
    pub async fn inspect(&self, path: &Path, folder: &str) -> Result<Option<Correction>> {
        let Some(spec) = DateSpec::parse(folder) else {
            return Ok(None);
        };

        let original = self.authoritative_timestamp(path).await?;
        let corrected = derive_corrected_timestamp(original, &spec);
        if corrected == original {
            return Ok(None);
        }

        Ok(Some(Correction {
            original,
            corrected,
            editable: self.supports_metadata(path),
        }))
    }

    /// Bring the timestamps of `path` in line with `folder`'s date.
    #[instrument(skip(self, failures, folder_path), fields(path = %path.display()))]
    pub async fn reconcile_file(
        &self,
        path: &Path,
        folder: &str,
        folder_path: &Path,
        failures: &mut FailureRegistry,
    ) -> Result<ReconcileOutcome> {
        if DateSpec::parse(folder).is_none() {
            return Ok(ReconcileOutcome::NoFolderDate);
        }

        let file_name = file_name_of(path);

        let Some(correction) = self.inspect(path, folder).await? else {
            if !self.dry_run {
                failures
                    .remove(FailureKind::ExifErrors, folder, &file_name)
                    .await?;
            }
            return Ok(ReconcileOutcome::Unchanged);
        };

        if self.dry_run {
            info!(
                from = %correction.original,
                to = %correction.corrected,
                "Dry run: would correct timestamps"
            );
            return Ok(ReconcileOutcome::WouldCorrect(correction));
        }

        let metadata = if correction.editable {
            match self
                .editor
                .write_timestamps(path, correction.corrected)
                .await
            {
                Ok(()) => {
                    failures
                        .remove(FailureKind::ExifErrors, folder, &file_name)
                        .await?;
                    failures
                        .remove(FailureKind::UnsupportedFormat, folder, &file_name)
                        .await?;
                    MetadataEdit::Written
                }
                Err(e) => {
                    warn!(error = %e, "Metadata edit failed");
                    failures
                        .add(FailureKind::ExifErrors, folder, &file_name, folder_path)
                        .await?;
                    MetadataEdit::Failed
                }
            }
        } else {
            failures
                .add(FailureKind::UnsupportedFormat, folder, &file_name, folder_path)
                .await?;
            MetadataEdit::Unsupported
        };

        if let Err(e) = set_file_times(path, correction.corrected) {
            warn!(error = %e, "Could not set filesystem timestamps");
        }

        info!(
            from = %correction.original,
            to = %correction.corrected,
            metadata = ?metadata,
            "Timestamps corrected"
        );

        Ok(ReconcileOutcome::Corrected {
            correction,
            metadata,
        })
    }
}

fn set_file_times(path: &Path, timestamp: NaiveDateTime) -> std::io::Result<()> {
    let local = Local
        .from_local_datetime(&timestamp)
        .earliest()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} does not exist in the local time zone", timestamp),
            )
        })?;
    let time = FileTime::from_unix_time(local.timestamp(), 0);
    filetime::set_file_times(path, time, time)
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
