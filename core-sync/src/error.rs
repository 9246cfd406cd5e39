use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("Remote error: {0}")]
    Remote(#[from] BridgeError),

    #[error("Cannot resolve album for folder '{folder}': {message}")]
    AlbumResolution { folder: String, message: String },

    #[error("Invalid root path: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        SyncError::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
