//! Date Audit
//!
//! Walks the whole tree, recursively, and lists files whose timestamps
//! disagree with the date in their folder's name. The list is written as a
//! plain-text report, one `<path> | FIX: <corrected>` line per file, and can
//! optionally be applied through the [`DateReconciler`].

use crate::error::{Result, SyncError};
use crate::failures::FailureRegistry;
use crate::reconcile::{Correction, DateReconciler};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default report file name
pub const DEFAULT_REPORT_FILE: &str = "exif-anomalies.txt";

const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
    pub path: PathBuf,
    pub folder: String,
    pub folder_path: PathBuf,
    pub correction: Correction,
}

impl AuditFinding {
    pub fn report_line(&self) -> String {
        format!(
            "{} | FIX: {}",
            self.path.display(),
            self.correction.corrected.format(REPORT_TIMESTAMP_FORMAT)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub anomalies: usize,
    pub fixed: usize,
}

pub struct DateAudit<'a> {
    reconciler: &'a DateReconciler,
}

impl<'a> DateAudit<'a> {
    pub fn new(reconciler: &'a DateReconciler) -> Self {
        Self { reconciler }
    }

    /// Find every file with editable metadata whose date disagrees with
    /// its folder. Hidden files and directories are skipped.
    pub async fn scan(&self, root: &Path) -> Result<Vec<AuditFinding>> {
        let files = walk_files(root.to_path_buf()).await?;
        let mut findings = Vec::new();

        for path in files {
            if !self.reconciler.supports_metadata(&path) {
                continue;
            }
            let Some(folder_path) = path.parent() else {
                continue;
            };
            let folder = folder_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match self.reconciler.inspect(&path, &folder).await {
                Ok(Some(correction)) => {
                    debug!(path = %path.display(), to = %correction.corrected, "Date anomaly");
                    findings.push(AuditFinding {
                        folder_path: folder_path.to_path_buf(),
                        path,
                        folder,
                        correction,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Cannot inspect file"),
            }
        }

        info!(anomalies = findings.len(), "Date audit scan complete");
        Ok(findings)
    }

    pub async fn write_report(&self, report_file: &Path, findings: &[AuditFinding]) -> Result<()> {
        let mut content = String::new();
        for finding in findings {
            content.push_str(&finding.report_line());
            content.push('\n');
        }
        tokio::fs::write(report_file, content)
            .await
            .map_err(|e| SyncError::persistence(report_file, e))?;
        info!(path = %report_file.display(), "Anomaly report written");
        Ok(())
    }

    /// Reconcile every finding. Returns how many were corrected.
    pub async fn apply(
        &self,
        findings: &[AuditFinding],
        failures: &mut FailureRegistry,
    ) -> Result<usize> {
        let mut fixed = 0;
        for finding in findings {
            match self
                .reconciler
                .reconcile_file(&finding.path, &finding.folder, &finding.folder_path, failures)
                .await
            {
                Ok(outcome) if outcome.is_correction() => fixed += 1,
                Ok(_) => {}
                Err(e @ SyncError::Persistence { .. }) => return Err(e),
                Err(e) => warn!(path = %finding.path.display(), error = %e, "Fix failed"),
            }
        }
        Ok(fixed)
    }
}

async fn walk_files(root: PathBuf) -> Result<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    })
    .await
    .map_err(|e| SyncError::Io(std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::JsonStore;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::metadata::MetadataEditor;
    use chrono::NaiveDateTime;
    use mockall::mock;
    use std::sync::Arc;
    use tempfile::TempDir;

    mock! {
        Editor {}

        #[async_trait]
        impl MetadataEditor for Editor {
            async fn read_capture_time(&self, path: &Path) -> BridgeResult<Option<NaiveDateTime>>;
            async fn write_timestamps(&self, path: &Path, timestamp: NaiveDateTime) -> BridgeResult<()>;
        }
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("2021-07 Trip").join("day 2");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("2021-07 Trip").join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("2021-07 Trip").join("clip.mov"), b"x").unwrap();
        std::fs::write(dir.path().join("2021-07 Trip").join(".b.jpg"), b"x").unwrap();
        std::fs::write(nested.join("c.jpg"), b"x").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_scan_and_report() {
        let dir = tree();

        let mut editor = MockEditor::new();
        editor
            .expect_read_capture_time()
            .returning(|_| Ok(Some(ts("2020-01-15 10:00:00"))));
        let reconciler = DateReconciler::new(Arc::new(editor), false);
        let audit = DateAudit::new(&reconciler);

        let findings = audit.scan(dir.path()).await.unwrap();

        // "day 2" carries no date; the movie has no editable metadata
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].folder, "2021-07 Trip");
        assert_eq!(findings[0].correction.corrected, ts("2021-07-15 10:00:00"));

        let report = dir.path().join(DEFAULT_REPORT_FILE);
        audit.write_report(&report, &findings).await.unwrap();
        let content = std::fs::read_to_string(&report).unwrap();
        assert_eq!(
            content,
            format!(
                "{} | FIX: 2021-07-15 10:00:00\n",
                dir.path().join("2021-07 Trip").join("a.jpg").display()
            )
        );
    }

    #[tokio::test]
    async fn test_apply_writes_metadata() {
        let dir = tree();

        let mut editor = MockEditor::new();
        editor
            .expect_read_capture_time()
            .returning(|_| Ok(Some(ts("2020-01-15 10:00:00"))));
        editor
            .expect_write_timestamps()
            .times(1)
            .returning(|_, _| Ok(()));
        let reconciler = DateReconciler::new(Arc::new(editor), false);
        let audit = DateAudit::new(&reconciler);
        let mut failures = FailureRegistry::load(JsonStore::new(dir.path().join("f.json")))
            .await
            .unwrap();

        let findings = audit.scan(dir.path()).await.unwrap();
        let fixed = audit.apply(&findings, &mut failures).await.unwrap();
        assert_eq!(fixed, 1);
        assert!(failures.is_empty());
    }
}
