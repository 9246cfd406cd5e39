//! Remote Photo Library Abstraction
//!
//! The contract between the sync engine and a remote photo service:
//! album creation and listing, raw content upload, and committing an
//! uploaded item into an album.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// An album as reported by the remote listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub id: String,
    pub title: String,
}

/// Outcome of attaching an uploaded item to an album.
///
/// Conditions the engine handles specially are surfaced as variants instead
/// of errors; transport failures stay in `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    /// Item created in the album
    Created { media_item_id: Option<String> },
    /// Remote returned 429
    RateLimited,
    /// Remote reported the target album no longer exists (404)
    AlbumNotFound,
    /// Any other non-success response
    Rejected { status: u16, message: String },
}

impl CommitStatus {
    pub fn is_created(&self) -> bool {
        matches!(self, CommitStatus::Created { .. })
    }
}

/// Remote photo library trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::library::{CommitStatus, PhotoLibrary};
///
/// async fn push(library: &dyn PhotoLibrary, path: &Path) -> Result<()> {
///     let album_id = library.create_album("2021-07 Holiday").await?;
///     let token = library.upload(path, "IMG_0001.jpg").await?;
///     match library.commit(&album_id, &token, "IMG_0001.jpg").await? {
///         CommitStatus::Created { .. } => Ok(()),
///         other => Err(BridgeError::OperationFailed(format!("{:?}", other))),
///     }
/// }
/// ```
#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// Create an album and return its identifier
    async fn create_album(&self, title: &str) -> Result<String>;

    /// List one page of albums. Returns the albums and the next page token.
    async fn list_albums(&self, page_token: Option<String>)
        -> Result<(Vec<RemoteAlbum>, Option<String>)>;

    /// Upload raw file content and return the opaque upload token
    async fn upload(&self, path: &Path, file_name: &str) -> Result<String>;

    /// Attach an uploaded item to an album
    async fn commit(
        &self,
        album_id: &str,
        upload_token: &str,
        description: &str,
    ) -> Result<CommitStatus>;
}
