//! OAuth 2.0 Refresh-Token Grant
//!
//! Implements the token refresh half of RFC 6749 for an installed client.
//! The interactive consent flow is not performed here; tokens are issued
//! elsewhere and only kept fresh.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: Some("your-client-secret".to_string()),
//!     token_url: "https://oauth2.googleapis.com/token".to_string(),
//! };
//!
//! let flow_manager = OAuthFlowManager::new(config, http_client);
//! let tokens = flow_manager.refresh_access_token("1//0g...").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{ClientCredentials, OAuthTokens};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{instrument, warn};

/// Attempts against the token endpoint when it answers 5xx
const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// OAuth 2.0 client configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (optional for public clients)
    pub client_secret: Option<String>,
    /// Token endpoint URL
    pub token_url: String,
}

impl From<&ClientCredentials> for OAuthConfig {
    fn from(credentials: &ClientCredentials) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            token_url: credentials.token_uri.clone(),
        }
    }
}

/// OAuth 2.0 flow manager.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    /// Create a new OAuth flow manager with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - OAuth client configuration
    /// * `http_client` - HTTP client for making token requests
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Server errors are retried with a short exponential backoff. Client
    /// errors (revoked or invalid grant) fail immediately with
    /// [`AuthError::RefreshRejected`].
    ///
    /// When the provider omits a new refresh token, the one passed in is kept.
    #[instrument(skip(self, refresh_token), fields(client_id = %self.config.client_id))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.config.client_id);

        if let Some(ref client_secret) = self.config.client_secret {
            params.insert("client_secret", client_secret);
        }

        tracing::debug!("Refreshing access token");

        let encoded_body = serde_urlencoded::to_string(&params).map_err(|e| {
            AuthError::TokenRefreshFailed(format!("Failed to encode token request: {}", e))
        })?;
        let body = Bytes::from(encoded_body);

        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone());

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|e| AuthError::NetworkError(e.to_string()))?;

            if response.is_success() {
                let token_response: TokenResponse = response.json().map_err(|e| {
                    AuthError::TokenRefreshFailed(format!("Failed to parse token response: {}", e))
                })?;

                tracing::info!(
                    "Successfully refreshed token (expires in {}s)",
                    token_response.expires_in
                );

                return Ok(OAuthTokens::new(
                    token_response.access_token,
                    token_response
                        .refresh_token
                        .or_else(|| Some(refresh_token.to_string())),
                    token_response.expires_in,
                ));
            }

            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if response.is_client_error() {
                warn!(
                    status = status,
                    error = %error_body,
                    "Token refresh failed without retry"
                );

                return Err(AuthError::RefreshRejected {
                    status,
                    message: error_body,
                });
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {} - {}",
                    attempts, status, error_body
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status = status,
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// Token response from the OAuth provider.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600 // Default to 1 hour if not specified
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use mockall::mock;
    use std::path::Path;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn upload_file(&self, request: HttpRequest, path: &Path) -> BridgeResult<HttpResponse>;
        }
    }

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: Some("secret".to_string()),
            token_url: "https://provider.example/token".to_string(),
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_refresh_success_keeps_refresh_token() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| {
                let body = String::from_utf8(req.body.clone().unwrap().to_vec()).unwrap();
                req.url == "https://provider.example/token"
                    && body.contains("grant_type=refresh_token")
                    && body.contains("refresh_token=old-refresh")
                    && body.contains("client_secret=secret")
            })
            .times(1)
            .returning(|_| Ok(response(200, r#"{"access_token":"fresh","expires_in":3599}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(mock_http));
        let tokens = manager.refresh_access_token("old-refresh").await.unwrap();

        assert_eq!(tokens.access_token, "fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("old-refresh"));
        assert!(!tokens.is_expired());
    }

    #[tokio::test]
    async fn test_refresh_client_error_is_not_retried() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(mock_http));
        let result = manager.refresh_access_token("revoked").await;

        match result {
            Err(AuthError::RefreshRejected { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("invalid_grant"));
            }
            other => panic!("Expected RefreshRejected, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_server_error_is_retried() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(503, "unavailable")));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"access_token":"fresh","refresh_token":"rotated","expires_in":3600}"#,
                ))
            });

        let manager = OAuthFlowManager::new(config(), Arc::new(mock_http));
        let tokens = manager.refresh_access_token("old").await.unwrap();

        assert_eq!(tokens.access_token, "fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rotated"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_gives_up_after_max_attempts() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(MAX_REFRESH_ATTEMPTS as usize)
            .returning(|_| Ok(response(500, "boom")));

        let manager = OAuthFlowManager::new(config(), Arc::new(mock_http));
        let result = manager.refresh_access_token("old").await;

        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_refresh_transport_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout("token endpoint".to_string())));

        let manager = OAuthFlowManager::new(config(), Arc::new(mock_http));
        let result = manager.refresh_access_token("old").await;

        assert!(matches!(result, Err(AuthError::NetworkError(_))));
    }

    #[test]
    fn test_config_from_client_credentials() {
        let creds = ClientCredentials::from_json(
            r#"{"installed":{"client_id":"id","client_secret":"s","token_uri":"https://t"}}"#,
        )
        .unwrap();

        let config = OAuthConfig::from(&creds);
        assert_eq!(config.client_id, "id");
        assert_eq!(config.client_secret.as_deref(), Some("s"));
        assert_eq!(config.token_url, "https://t");
    }

    #[test]
    fn test_token_response_deserialization_minimal() {
        let json = r#"{
            "access_token": "token"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "token");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, 3600);
    }
}
