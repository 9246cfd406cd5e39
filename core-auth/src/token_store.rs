//! File-Backed Token Storage
//!
//! Persists OAuth tokens as a JSON file. Writes go to a sibling temporary
//! file first and are renamed into place so an interrupted write never
//! leaves a truncated token file behind.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{OAuthTokens, TokenStore};
//!
//! # async fn example() -> core_auth::Result<()> {
//! let token_store = TokenStore::new("token.json");
//!
//! let tokens = OAuthTokens::new(
//!     "access_token_value".to_string(),
//!     Some("refresh_token_value".to_string()),
//!     3600,
//! );
//!
//! token_store.store_tokens(&tokens).await?;
//! let retrieved = token_store.retrieve_tokens().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// JSON file storage for OAuth tokens
///
/// Token values are never logged; only the file location is.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a token store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist tokens, replacing any previous content
    pub async fn store_tokens(&self, tokens: &OAuthTokens) -> Result<()> {
        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize tokens: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(path = %self.path.display(), "Tokens stored");
        Ok(())
    }

    /// Load tokens. Returns `Ok(None)` when the file does not exist.
    pub async fn retrieve_tokens(&self) -> Result<Option<OAuthTokens>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No token file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let tokens = serde_json::from_slice(&content).map_err(|e| {
            AuthError::Storage(format!(
                "Corrupt token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(tokens))
    }

    /// Remove the token file if present
    pub async fn delete_tokens(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
