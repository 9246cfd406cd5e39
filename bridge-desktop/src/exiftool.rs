//! Metadata Editor Implementation using the `exiftool` binary

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    metadata::{MetadataEditor, METADATA_DATETIME_FORMAT},
};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// `exiftool`-backed metadata editor
///
/// Every invocation runs under a timeout; a hung process is killed when the
/// future is dropped.
pub struct ExifToolEditor {
    binary: PathBuf,
    timeout: Duration,
}

impl ExifToolEditor {
    /// Use `exiftool` from `PATH`
    pub fn new(timeout: Duration) -> Self {
        Self::with_binary("exiftool", timeout)
    }

    /// Use a specific `exiftool` executable
    pub fn with_binary(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Check that the binary can be executed, returning its version
    pub async fn version(&self) -> Result<String> {
        let output = self.run(&["-ver".to_string()], None).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run(&self, args: &[String], path: Option<&Path>) -> Result<Output> {
        let mut command = Command::new(&self.binary);
        command.args(args).kill_on_drop(true);
        if let Some(path) = path {
            command.arg(path);
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                BridgeError::Timeout(format!(
                    "exiftool did not finish within {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BridgeError::NotAvailable(format!(
                    "exiftool not found at {}",
                    self.binary.display()
                )),
                _ => BridgeError::Io(e),
            })?;

        if !output.status.success() {
            return Err(BridgeError::OperationFailed(format!(
                "exiftool exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output)
    }
}

/// Parse a `DateTimeOriginal` value as printed by `exiftool -s3`.
///
/// Trailing sub-second or offset suffixes are ignored.
fn parse_exiftool_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let head = trimmed.get(..19)?;
    NaiveDateTime::parse_from_str(head, METADATA_DATETIME_FORMAT).ok()
}

#[async_trait]
impl MetadataEditor for ExifToolEditor {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_capture_time(&self, path: &Path) -> Result<Option<NaiveDateTime>> {
        let args = ["-s", "-s", "-s", "-DateTimeOriginal"].map(String::from);
        let output = self.run(&args, Some(path)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if stdout.trim().is_empty() {
            debug!("No DateTimeOriginal tag present");
            return Ok(None);
        }

        let parsed = parse_exiftool_datetime(&stdout);
        if parsed.is_none() {
            warn!(value = %stdout.trim(), "Unparseable DateTimeOriginal value");
        }
        Ok(parsed)
    }

    #[instrument(skip(self), fields(path = %path.display(), timestamp = %timestamp))]
    async fn write_timestamps(&self, path: &Path, timestamp: NaiveDateTime) -> Result<()> {
        let formatted = timestamp.format(METADATA_DATETIME_FORMAT).to_string();
        let args = vec![
            "-overwrite_original".to_string(),
            format!("-DateTimeOriginal={}", formatted),
            format!("-CreateDate={}", formatted),
            format!("-ModifyDate={}", formatted),
        ];

        self.run(&args, Some(path)).await?;
        debug!("Embedded timestamps rewritten");
        Ok(())
    }
}
