use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{AuthError, Result};

/// Google's token endpoint, used when the client file does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth 2.0 token set.
///
/// Contains the access token, refresh token, and expiration time
/// for an authenticated session. Token files written by other Google
/// tooling use `token` and `expiry`; both are accepted on read.
///
/// # Security
///
/// Tokens should be stored securely and never logged. The `Debug` implementation
/// redacts sensitive information.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
/// use chrono::{Duration, Utc};
///
/// let tokens = OAuthTokens {
///     access_token: "ya29.a0...".to_string(),
///     refresh_token: Some("1//0g...".to_string()),
///     expires_at: Some(Utc::now() + Duration::hours(1)),
/// };
///
/// assert!(!tokens.is_expired());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    #[serde(alias = "token")]
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC). Unknown expiry is treated as expired.
    #[serde(default, alias = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthTokens {
    /// Create a new token set
    ///
    /// # Arguments
    ///
    /// * `access_token` - The OAuth access token
    /// * `refresh_token` - The OAuth refresh token, if the provider issued one
    /// * `expires_in` - Number of seconds until token expiration
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Some(Utc::now() + chrono::Duration::seconds(expires_in)),
        }
    }

    /// Check if the access token is expired or will expire within 5 minutes
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(300)
    }

    /// Check if the access token is expired with a custom buffer
    ///
    /// # Arguments
    ///
    /// * `buffer_seconds` - Number of seconds before expiration to consider expired
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(buffer_seconds);
                Utc::now() >= expires_at - buffer
            }
            None => true,
        }
    }

    /// Get the time remaining until token expiration
    ///
    /// Returns `None` if the token is already expired or the expiry is unknown.
    pub fn time_until_expiry(&self) -> Option<chrono::Duration> {
        let expires_at = self.expires_at?;
        let now = Utc::now();
        if now >= expires_at {
            None
        } else {
            Some(expires_at - now)
        }
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth client identity from a Google client-secret file.
///
/// The file has a single top-level `installed` or `web` section.
#[derive(Clone, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientCredentials>,
    web: Option<ClientCredentials>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientCredentials {
    /// Parse the JSON content of a client-secret file
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| AuthError::InvalidCredentials(format!("Malformed client file: {}", e)))?;

        file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidCredentials(
                "Client file has neither an 'installed' nor a 'web' section".to_string(),
            )
        })
    }

    /// Read and parse a client-secret file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            AuthError::InvalidCredentials(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_uri", &self.token_uri)
            .finish()
    }
}
