//! Embedded Metadata Abstraction
//!
//! Reads and rewrites capture timestamps stored inside media files. The
//! desktop implementation shells out to an external tool, so every call is
//! fallible and bounded in latency.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::path::Path;

use crate::error::Result;

/// Format used when handing timestamps to the metadata editor
pub const METADATA_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[async_trait]
pub trait MetadataEditor: Send + Sync {
    /// Read the embedded capture time (`DateTimeOriginal`), if present
    async fn read_capture_time(&self, path: &Path) -> Result<Option<NaiveDateTime>>;

    /// Overwrite capture, create, and modify timestamps with `timestamp`
    async fn write_timestamps(&self, path: &Path, timestamp: NaiveDateTime) -> Result<()>;
}
