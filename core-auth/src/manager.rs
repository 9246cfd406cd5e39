//! # Authentication Manager
//!
//! Supplies bearer tokens to API connectors.
//!
//! ## Overview
//!
//! Connectors depend on the [`AccessTokenSource`] trait rather than on a
//! concrete manager. Two sources exist:
//!
//! - [`AuthManager`] keeps a persisted token set fresh, refreshing it when it
//!   is about to expire and writing the result back to the [`TokenStore`].
//! - [`StaticToken`] hands out a fixed token, for short-lived runs where the
//!   token was obtained out of band.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AccessTokenSource, AuthManager, ClientCredentials, OAuthFlowManager, TokenStore};
//! use std::path::Path;
//! use std::sync::Arc;
//! # use bridge_traits::http::HttpClient;
//!
//! # async fn example(http_client: Arc<dyn HttpClient>) -> core_auth::Result<()> {
//! let credentials = ClientCredentials::from_file(Path::new("credentials.json")).await?;
//! let oauth = OAuthFlowManager::new((&credentials).into(), http_client);
//! let manager = AuthManager::new(TokenStore::new("token.json"), oauth);
//!
//! let token = manager.access_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::OAuthFlowManager;
use crate::token_store::TokenStore;
use crate::types::OAuthTokens;
use async_trait::async_trait;
use core_runtime::logging::redact_if_sensitive;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

/// Default timeout for a token refresh (2 minutes)
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

/// Buffer time before token expiration to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(300);

/// Source of bearer tokens for remote API calls
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// Return a token valid for at least the next few minutes
    async fn access_token(&self) -> Result<String>;
}

/// Fixed bearer token, never refreshed
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken")
            .field("token", &redact_if_sensitive("token", &self.token))
            .finish()
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(AuthError::NotAuthenticated(
                "Static access token is empty".to_string(),
            ));
        }
        Ok(self.token.clone())
    }
}

/// Token manager backed by a token file and the refresh-token grant.
///
/// The token set is loaded lazily on first use and cached; the mutex also
/// serializes refreshes so concurrent callers never refresh twice.
pub struct AuthManager {
    token_store: TokenStore,
    oauth: OAuthFlowManager,
    cached: Mutex<Option<OAuthTokens>>,
}

impl AuthManager {
    pub fn new(token_store: TokenStore, oauth: OAuthFlowManager) -> Self {
        Self {
            token_store,
            oauth,
            cached: Mutex::new(None),
        }
    }

    /// Get a valid access token, refreshing and persisting it if needed.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] when no token file exists or it
    ///   carries no refresh token once the access token has expired
    /// - [`AuthError::RefreshRejected`] when the provider refuses the refresh
    #[instrument(skip(self), fields(token_file = %self.token_store.path().display()))]
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        let tokens = match cached.take() {
            Some(tokens) => tokens,
            None => self.token_store.retrieve_tokens().await?.ok_or_else(|| {
                warn!("No tokens found");
                AuthError::NotAuthenticated(format!(
                    "No token file at {}; authorize the application first",
                    self.token_store.path().display()
                ))
            })?,
        };

        if !tokens.is_expired_with_buffer(TOKEN_REFRESH_BUFFER.as_secs() as i64) {
            debug!("Token is valid, no refresh needed");
            let access_token = tokens.access_token.clone();
            *cached = Some(tokens);
            return Ok(access_token);
        }

        info!("Token expired or expiring soon, refreshing");

        let Some(refresh_token) = tokens.refresh_token.clone() else {
            error!("No refresh token available");
            return Err(AuthError::NotAuthenticated(
                "Access token expired and no refresh token is stored".to_string(),
            ));
        };

        let new_tokens = match timeout(
            DEFAULT_AUTH_TIMEOUT,
            self.oauth.refresh_access_token(&refresh_token),
        )
        .await
        {
            Ok(result) => result.map_err(|e| {
                error!("Token refresh failed: {}", e);
                e
            })?,
            Err(_) => {
                error!("Token refresh timed out");
                return Err(AuthError::OperationTimeout {
                    operation: "token refresh".to_string(),
                });
            }
        };

        self.token_store.store_tokens(&new_tokens).await?;

        info!(
            access_token = %redact_if_sensitive("access_token", &new_tokens.access_token),
            "Token refreshed successfully"
        );

        let access_token = new_tokens.access_token.clone();
        *cached = Some(new_tokens);
        Ok(access_token)
    }
}

#[async_trait]
impl AccessTokenSource for AuthManager {
    async fn access_token(&self) -> Result<String> {
        self.get_valid_token().await
    }
}
