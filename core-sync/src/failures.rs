//! # Failure Registry
//!
//! Durable record of files that could not be processed, keyed by failure
//! kind and folder name. Entries stay parked until a retry pass or the
//! recovery loop succeeds with them.
//!
//! On disk the registry is a JSON object with one key per kind:
//!
//! ```json
//! {
//!   "UploadError": {
//!     "2021-07 Holiday": { "path": "/photos/2021-07 Holiday", "files": ["IMG_0001.jpg"] }
//!   },
//!   "AddToAlbumError": {},
//!   "TooLarge": {},
//!   "ExifErrors": {},
//!   "UnsupportedFormat": {}
//! }
//! ```

use crate::error::{Result, SyncError};
use crate::persistence::JsonStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// Content transfer failed after all attempts
    UploadError,
    /// Commit into the album failed after all attempts
    AddToAlbumError,
    /// File exceeds the upload size limit; never retried automatically
    TooLarge,
    /// Embedded metadata could not be rewritten
    ExifErrors,
    /// Format carries no editable capture metadata (advisory)
    UnsupportedFormat,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::UploadError,
        FailureKind::AddToAlbumError,
        FailureKind::TooLarge,
        FailureKind::ExifErrors,
        FailureKind::UnsupportedFormat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UploadError => "UploadError",
            FailureKind::AddToAlbumError => "AddToAlbumError",
            FailureKind::TooLarge => "TooLarge",
            FailureKind::ExifErrors => "ExifErrors",
            FailureKind::UnsupportedFormat => "UnsupportedFormat",
        }
    }

    /// Kinds produced by the upload path. A file holds at most one of these.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            FailureKind::UploadError | FailureKind::AddToAlbumError | FailureKind::TooLarge
        )
    }

    /// Kinds the recovery loop re-drives
    pub fn retry_eligible(watch_exif: bool) -> Vec<FailureKind> {
        let mut kinds = vec![FailureKind::UploadError, FailureKind::AddToAlbumError];
        if watch_exif {
            kinds.push(FailureKind::ExifErrors);
        }
        kinds
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "UploadError" => Ok(FailureKind::UploadError),
            "AddToAlbumError" => Ok(FailureKind::AddToAlbumError),
            "TooLarge" => Ok(FailureKind::TooLarge),
            "ExifErrors" => Ok(FailureKind::ExifErrors),
            "UnsupportedFormat" | "UnsupportedExifFormat" => Ok(FailureKind::UnsupportedFormat),
            _ => Err(format!("Unknown failure kind: {}", s)),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parked files of one folder under one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub path: PathBuf,
    /// Insertion-ordered, no duplicates
    #[serde(default)]
    pub files: Vec<String>,
}

type RawRegistry = BTreeMap<String, BTreeMap<String, FailureEntry>>;

/// Kind to folder to [`FailureEntry`] store with write-through persistence
#[derive(Debug)]
pub struct FailureRegistry {
    store: JsonStore,
    entries: BTreeMap<FailureKind, BTreeMap<String, FailureEntry>>,
}

impl FailureRegistry {
    pub async fn load(store: JsonStore) -> Result<Self> {
        let entries = Self::read(&store).await?;
        Ok(Self { store, entries })
    }

    /// Replace the in-memory view with the file content
    pub async fn reload(&mut self) -> Result<()> {
        self.entries = Self::read(&self.store).await?;
        Ok(())
    }

    async fn read(store: &JsonStore) -> Result<BTreeMap<FailureKind, BTreeMap<String, FailureEntry>>> {
        let raw: RawRegistry = store.load().await?;

        let mut entries: BTreeMap<FailureKind, BTreeMap<String, FailureEntry>> = BTreeMap::new();
        for (key, folders) in raw {
            let kind = FailureKind::from_str(&key)
                .map_err(|message| SyncError::persistence(store.path(), message))?;

            // Both spellings of the advisory kind may be present
            let merged = entries.entry(kind).or_default();
            for (folder, entry) in folders {
                match merged.get_mut(&folder) {
                    Some(existing) => {
                        for file in entry.files {
                            if !existing.files.contains(&file) {
                                existing.files.push(file);
                            }
                        }
                    }
                    None => {
                        merged.insert(folder, entry);
                    }
                }
            }
        }
        for folders in entries.values_mut() {
            folders.retain(|_, entry| !entry.files.is_empty());
        }
        entries.retain(|_, folders| !folders.is_empty());

        Ok(entries)
    }

    /// Park `file_name` under `kind`. Returns `false` if it was already there.
    pub async fn add(
        &mut self,
        kind: FailureKind,
        folder: &str,
        file_name: &str,
        folder_path: &Path,
    ) -> Result<bool> {
        let inserted = self.insert(kind, folder, file_name, folder_path);
        if inserted {
            warn!(kind = %kind, folder = %folder, file = %file_name, "Failure recorded");
            self.persist().await?;
        }
        Ok(inserted)
    }

    /// Unpark `file_name` from `kind`. Returns `false` if it was not there.
    pub async fn remove(&mut self, kind: FailureKind, folder: &str, file_name: &str) -> Result<bool> {
        let removed = self.take(kind, folder, file_name);
        if removed {
            debug!(kind = %kind, folder = %folder, file = %file_name, "Failure cleared");
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Move a file to `kind`, dropping it from every other upload-path kind
    pub async fn reclassify(
        &mut self,
        kind: FailureKind,
        folder: &str,
        file_name: &str,
        folder_path: &Path,
    ) -> Result<()> {
        let mut changed = false;
        for other in FailureKind::ALL {
            if other != kind && other.is_active() {
                changed |= self.take(other, folder, file_name);
            }
        }
        let inserted = self.insert(kind, folder, file_name, folder_path);
        if inserted {
            warn!(kind = %kind, folder = %folder, file = %file_name, "Failure recorded");
        }
        if changed || inserted {
            self.persist().await?;
        }
        Ok(())
    }

    /// Drop a committed file from every upload-path kind
    pub async fn clear_active(&mut self, folder: &str, file_name: &str) -> Result<()> {
        let mut changed = false;
        for kind in FailureKind::ALL {
            if kind.is_active() {
                changed |= self.take(kind, folder, file_name);
            }
        }
        if changed {
            debug!(folder = %folder, file = %file_name, "Parked failures cleared after commit");
            self.persist().await?;
        }
        Ok(())
    }

    pub fn contains(&self, kind: FailureKind, folder: &str, file_name: &str) -> bool {
        self.entries
            .get(&kind)
            .and_then(|folders| folders.get(folder))
            .is_some_and(|entry| entry.files.iter().any(|f| f == file_name))
    }

    /// Every kind a file is parked under
    pub fn kinds_for(&self, folder: &str, file_name: &str) -> Vec<FailureKind> {
        FailureKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind, folder, file_name))
            .collect()
    }

    /// Owned copy of the entries under `kind`, for iteration while mutating
    pub fn snapshot(&self, kind: FailureKind) -> Vec<(String, FailureEntry)> {
        self.entries
            .get(&kind)
            .map(|folders| {
                folders
                    .iter()
                    .map(|(folder, entry)| (folder.clone(), entry.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.entries
            .get(&kind)
            .map(|folders| folders.values().map(|e| e.files.len()).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn persist(&self) -> Result<()> {
        let mut raw = RawRegistry::new();
        for kind in FailureKind::ALL {
            raw.insert(
                kind.as_str().to_string(),
                self.entries.get(&kind).cloned().unwrap_or_default(),
            );
        }
        self.store.save(&raw).await
    }

    fn insert(&mut self, kind: FailureKind, folder: &str, file_name: &str, folder_path: &Path) -> bool {
        let entry = self
            .entries
            .entry(kind)
            .or_default()
            .entry(folder.to_string())
            .or_insert_with(|| FailureEntry {
                path: folder_path.to_path_buf(),
                files: Vec::new(),
            });

        if entry.files.iter().any(|f| f == file_name) {
            return false;
        }
        entry.files.push(file_name.to_string());
        true
    }

    fn take(&mut self, kind: FailureKind, folder: &str, file_name: &str) -> bool {
        let Some(folders) = self.entries.get_mut(&kind) else {
            return false;
        };
        let Some(entry) = folders.get_mut(folder) else {
            return false;
        };
        let Some(pos) = entry.files.iter().position(|f| f == file_name) else {
            return false;
        };

        entry.files.remove(pos);
        if entry.files.is_empty() {
            folders.remove(folder);
        }
        if folders.is_empty() {
            self.entries.remove(&kind);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn registry(dir: &TempDir) -> FailureRegistry {
        FailureRegistry::load(JsonStore::new(dir.path().join("failed_uploads.json")))
            .await
            .unwrap()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("TooLarge".parse::<FailureKind>(), Ok(FailureKind::TooLarge));
        assert_eq!(
            "UnsupportedExifFormat".parse::<FailureKind>(),
            Ok(FailureKind::UnsupportedFormat)
        );
        assert!("Whatever".parse::<FailureKind>().is_err());
        assert_eq!(FailureKind::ExifErrors.to_string(), "ExifErrors");
    }

    #[test]
    fn test_retry_eligible_kinds() {
        assert_eq!(
            FailureKind::retry_eligible(false),
            vec![FailureKind::UploadError, FailureKind::AddToAlbumError]
        );
        assert!(FailureKind::retry_eligible(true).contains(&FailureKind::ExifErrors));
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir).await;
        let path = dir.path().join("2021");

        assert!(reg.add(FailureKind::UploadError, "2021", "a.jpg", &path).await.unwrap());
        assert!(!reg.add(FailureKind::UploadError, "2021", "a.jpg", &path).await.unwrap());
        assert!(reg.add(FailureKind::UploadError, "2021", "b.jpg", &path).await.unwrap());

        let snapshot = reg.snapshot(FailureKind::UploadError);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1.files, vec!["a.jpg", "b.jpg"]);
        assert_eq!(snapshot[0].1.path, path);
    }

    #[tokio::test]
    async fn test_remove_last_file_drops_entry() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir).await;
        let path = dir.path().join("2021");

        reg.add(FailureKind::TooLarge, "2021", "big.tif", &path).await.unwrap();
        assert!(reg.remove(FailureKind::TooLarge, "2021", "big.tif").await.unwrap());
        assert!(!reg.remove(FailureKind::TooLarge, "2021", "big.tif").await.unwrap());
        assert!(reg.snapshot(FailureKind::TooLarge).is_empty());
        assert!(reg.is_empty());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("failed_uploads.json")).unwrap())
                .unwrap();
        assert_eq!(raw["TooLarge"], serde_json::json!({}));
        assert!(raw.get("UploadError").is_some());
    }

    #[tokio::test]
    async fn test_reclassify_keeps_single_active_kind() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir).await;
        let path = dir.path().join("2021");

        reg.add(FailureKind::UploadError, "2021", "a.jpg", &path).await.unwrap();
        reg.add(FailureKind::ExifErrors, "2021", "a.jpg", &path).await.unwrap();
        reg.reclassify(FailureKind::AddToAlbumError, "2021", "a.jpg", &path)
            .await
            .unwrap();

        assert_eq!(
            reg.kinds_for("2021", "a.jpg"),
            vec![FailureKind::AddToAlbumError, FailureKind::ExifErrors]
        );

        reg.clear_active("2021", "a.jpg").await.unwrap();
        assert_eq!(reg.kinds_for("2021", "a.jpg"), vec![FailureKind::ExifErrors]);
    }

    #[tokio::test]
    async fn test_reload_reads_legacy_kind_names() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("failed_uploads.json");
        std::fs::write(
            &file,
            r#"{
                "UploadError": {},
                "UnsupportedExifFormat": { "2019": { "path": "/p/2019", "files": ["clip.mov"] } },
                "UnsupportedFormat": { "2019": { "path": "/p/2019", "files": ["clip.mov", "x.avi"] } }
            }"#,
        )
        .unwrap();

        let reg = registry(&dir).await;
        let entries = reg.snapshot(FailureKind::UnsupportedFormat);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.files.len(), 2);
        assert_eq!(reg.count(FailureKind::UnsupportedFormat), 2);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("failed_uploads.json"), r#"{ "Mystery": {} }"#).unwrap();

        let result =
            FailureRegistry::load(JsonStore::new(dir.path().join("failed_uploads.json"))).await;
        assert!(matches!(result, Err(SyncError::Persistence { .. })));
    }

    #[tokio::test]
    async fn test_reload_sees_external_changes() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir).await;
        let mut other = registry(&dir).await;

        other
            .add(FailureKind::UploadError, "2020", "c.jpg", Path::new("/p/2020"))
            .await
            .unwrap();
        assert!(!reg.contains(FailureKind::UploadError, "2020", "c.jpg"));

        reg.reload().await.unwrap();
        assert!(reg.contains(FailureKind::UploadError, "2020", "c.jpg"));
    }
}
