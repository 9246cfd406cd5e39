//! Google Photos Library API connector implementation
//!
//! Implements the `PhotoLibrary` trait for the Photos Library REST API v1.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::library::{CommitStatus, PhotoLibrary, RemoteAlbum};
use core_auth::AccessTokenSource;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GooglePhotosError;
use crate::types::{
    AlbumsListResponse, BatchCreateRequest, BatchCreateResponse, CreateAlbumRequest, NewAlbum,
    NewMediaItem, SimpleMediaItem,
};

/// Photos Library API base URL
const PHOTOS_API_BASE: &str = "https://photoslibrary.googleapis.com/v1";

/// Maximum albums per page (API limit)
const ALBUM_PAGE_SIZE: u32 = 50;

/// Fixed part of the raw byte upload deadline
const UPLOAD_BASE_TIMEOUT: Duration = Duration::from_secs(360);

/// Slowest sustained upload rate still expected to finish, in bytes per second
const MIN_UPLOAD_BYTES_PER_SEC: u64 = 256 * 1024;

/// Timeout for JSON API calls
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// google.rpc.Code values reported per item by batchCreate
const RPC_NOT_FOUND: i32 = 5;
const RPC_RESOURCE_EXHAUSTED: i32 = 8;

/// Google Photos API connector
///
/// Every call is a single attempt. Rate limiting and missing albums are
/// reported through [`CommitStatus`] so the sync engine can react to them.
///
/// # Example
///
/// ```ignore
/// use provider_google_photos::GooglePhotosConnector;
/// use bridge_traits::library::PhotoLibrary;
///
/// let connector = GooglePhotosConnector::new(http_client, token_source);
/// let album_id = connector.create_album("2021-07 Holiday").await?;
/// ```
pub struct GooglePhotosConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Bearer token provider
    tokens: Arc<dyn AccessTokenSource>,

    base_url: String,
}

impl GooglePhotosConnector {
    /// Create a new Google Photos connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `tokens` - Source of access tokens with the `photoslibrary` scopes
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http_client,
            tokens,
            base_url: PHOTOS_API_BASE.to_string(),
        }
    }

    /// Point the connector at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn authorized(&self, request: HttpRequest) -> Result<HttpRequest> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(GooglePhotosError::from)?;
        Ok(request.bearer_token(token))
    }

    fn api_error(response: &HttpResponse) -> GooglePhotosError {
        GooglePhotosError::ApiError {
            status_code: response.status,
            message: String::from_utf8_lossy(&response.body).to_string(),
        }
    }

    fn interpret_commit(response: &HttpResponse) -> std::result::Result<CommitStatus, GooglePhotosError> {
        match response.status {
            429 => return Ok(CommitStatus::RateLimited),
            404 => return Ok(CommitStatus::AlbumNotFound),
            _ if !response.is_success() => {
                return Ok(CommitStatus::Rejected {
                    status: response.status,
                    message: String::from_utf8_lossy(&response.body).to_string(),
                })
            }
            _ => {}
        }

        let parsed: BatchCreateResponse = serde_json::from_slice(&response.body).map_err(|e| {
            GooglePhotosError::ParseError(format!("Failed to parse batchCreate response: {}", e))
        })?;

        let Some(result) = parsed.new_media_item_results.into_iter().next() else {
            return Ok(CommitStatus::Rejected {
                status: response.status,
                message: "batchCreate returned no item results".to_string(),
            });
        };

        let status = match result.status {
            Some(status) if status.code != 0 => status,
            _ => {
                return Ok(CommitStatus::Created {
                    media_item_id: result.media_item.map(|item| item.id),
                })
            }
        };

        Ok(match status.code {
            RPC_RESOURCE_EXHAUSTED => CommitStatus::RateLimited,
            RPC_NOT_FOUND => CommitStatus::AlbumNotFound,
            _ => CommitStatus::Rejected {
                status: response.status,
                message: status.message,
            },
        })
    }
}

#[async_trait]
impl PhotoLibrary for GooglePhotosConnector {
    #[instrument(skip(self), fields(title = %title))]
    async fn create_album(&self, title: &str) -> Result<String> {
        let url = format!("{}/albums", self.base_url);
        let body = CreateAlbumRequest {
            album: NewAlbum { title },
        };
        let request = self
            .authorized(
                HttpRequest::new(HttpMethod::Post, url)
                    .json(&body)?
                    .timeout(API_TIMEOUT),
            )
            .await?;

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "Album creation failed");
            return Err(Self::api_error(&response).into());
        }

        let album: crate::types::Album = serde_json::from_slice(&response.body).map_err(|e| {
            GooglePhotosError::ParseError(format!("Failed to parse created album: {}", e))
        })?;

        info!(album_id = %album.id, "Album created");
        Ok(album.id)
    }

    #[instrument(skip(self))]
    async fn list_albums(
        &self,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteAlbum>, Option<String>)> {
        let mut url = format!("{}/albums?pageSize={}", self.base_url, ALBUM_PAGE_SIZE);
        if let Some(page_token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&page_token)));
        }

        let request = self
            .authorized(
                HttpRequest::new(HttpMethod::Get, url)
                    .header("Accept", "application/json")
                    .timeout(API_TIMEOUT),
            )
            .await?;

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "Album listing failed");
            return Err(Self::api_error(&response).into());
        }

        let list: AlbumsListResponse = serde_json::from_slice(&response.body).map_err(|e| {
            GooglePhotosError::ParseError(format!("Failed to parse albums list: {}", e))
        })?;

        let albums: Vec<RemoteAlbum> = list
            .albums
            .into_iter()
            .map(|album| RemoteAlbum {
                id: album.id,
                title: album.title,
            })
            .collect();

        debug!("Listed {} albums", albums.len());
        Ok((albums, list.next_page_token))
    }

    #[instrument(skip(self, path), fields(file = %file_name))]
    async fn upload(&self, path: &Path, file_name: &str) -> Result<String> {
        let size = tokio::fs::metadata(path).await?.len();
        let url = format!("{}/uploads", self.base_url);
        let request = self
            .authorized(
                HttpRequest::new(HttpMethod::Post, url)
                    .header("Content-Type", "application/octet-stream")
                    .header("X-Goog-Upload-File-Name", file_name)
                    .header("X-Goog-Upload-Protocol", "raw")
                    .timeout(upload_deadline(size)),
            )
            .await?;

        let response = self.http_client.upload_file(request, path).await?;
        if !response.is_success() {
            warn!(status = response.status, "Upload failed");
            return Err(Self::api_error(&response).into());
        }

        let token = response.text()?.trim().to_string();
        if token.is_empty() {
            return Err(GooglePhotosError::ParseError("Empty upload token".to_string()).into());
        }

        debug!("Upload token received");
        Ok(token)
    }

    #[instrument(skip(self, upload_token), fields(album_id = %album_id))]
    async fn commit(
        &self,
        album_id: &str,
        upload_token: &str,
        description: &str,
    ) -> Result<CommitStatus> {
        let url = format!("{}/mediaItems:batchCreate", self.base_url);
        let body = BatchCreateRequest {
            album_id,
            new_media_items: vec![NewMediaItem {
                description,
                simple_media_item: SimpleMediaItem { upload_token },
            }],
        };
        let request = self
            .authorized(
                HttpRequest::new(HttpMethod::Post, url)
                    .json(&body)?
                    .timeout(API_TIMEOUT),
            )
            .await?;

        let response = self.http_client.execute(request).await?;
        let status = Self::interpret_commit(&response)?;

        if !status.is_created() {
            warn!(http_status = response.status, outcome = ?status, "Commit not accepted");
        }
        Ok(status)
    }
}

/// Whole-request deadline for uploading `size` bytes.
///
/// Grows with the file so large uploads on slow links are not cut off.
fn upload_deadline(size: u64) -> Duration {
    UPLOAD_BASE_TIMEOUT + Duration::from_secs(size.div_ceil(MIN_UPLOAD_BYTES_PER_SEC))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bytes::Bytes;
    use core_auth::StaticToken;
    use mockall::mock;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn photo(dir: &TempDir, name: &str, size: usize) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
            async fn upload_file(&self, request: HttpRequest, path: &Path) -> Result<HttpResponse>;
        }
    }

    fn connector(mock_http: MockHttpClient) -> GooglePhotosConnector {
        GooglePhotosConnector::new(Arc::new(mock_http), Arc::new(StaticToken::new("test_token")))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn body_json(request: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_create_album_success() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == "https://photoslibrary.googleapis.com/v1/albums"
                    && req.headers.get("Authorization") == Some(&"Bearer test_token".to_string())
                    && body_json(req)["album"]["title"] == "2021-07 Holiday"
            })
            .times(1)
            .returning(|_| Ok(response(200, r#"{"id":"album-1","title":"2021-07 Holiday"}"#)));

        let id = connector(mock_http)
            .create_album("2021-07 Holiday")
            .await
            .unwrap();
        assert_eq!(id, "album-1");
    }

    #[tokio::test]
    async fn test_create_album_api_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(403, "insufficient scopes")));

        let result = connector(mock_http).create_album("x").await;
        match result {
            Err(BridgeError::OperationFailed(msg)) => assert!(msg.contains("403")),
            other => panic!("Expected OperationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_albums_with_page_token() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.url.contains("pageSize=50")
                    && req.url.contains("pageToken=next%2Fpage")
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"albums":[{"id":"a1","title":"2020"},{"id":"a2"}],"nextPageToken":"p3"}"#,
                ))
            });

        let (albums, next) = connector(mock_http)
            .list_albums(Some("next/page".to_string()))
            .await
            .unwrap();

        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].title, "2020");
        assert_eq!(albums[1].title, "");
        assert_eq!(next, Some("p3".to_string()));
    }

    #[tokio::test]
    async fn test_upload_sends_raw_protocol_headers() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_upload_file()
            .withf(|req, path| {
                req.url == "https://photoslibrary.googleapis.com/v1/uploads"
                    && req.headers.get("X-Goog-Upload-Protocol") == Some(&"raw".to_string())
                    && req.headers.get("X-Goog-Upload-File-Name")
                        == Some(&"IMG_0001.jpg".to_string())
                    && req.headers.get("Content-Type")
                        == Some(&"application/octet-stream".to_string())
                    && req.timeout == Some(UPLOAD_BASE_TIMEOUT + Duration::from_secs(1))
                    && path.ends_with("IMG_0001.jpg")
            })
            .times(1)
            .returning(|_, _| Ok(response(200, "upload-token-xyz\n")));

        let dir = TempDir::new().unwrap();
        let file = photo(&dir, "IMG_0001.jpg", 1024);
        let token = connector(mock_http)
            .upload(&file, "IMG_0001.jpg")
            .await
            .unwrap();
        assert_eq!(token, "upload-token-xyz");
    }

    #[tokio::test]
    async fn test_upload_transport_error_passes_through() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_upload_file()
            .times(1)
            .returning(|_, _| Err(BridgeError::Timeout("upload".to_string())));

        let dir = TempDir::new().unwrap();
        let file = photo(&dir, "a.jpg", 16);
        let result = connector(mock_http).upload(&file, "a.jpg").await;
        assert!(matches!(result, Err(BridgeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_large_upload_deadline_scales_with_size() {
        let size: u64 = 4 * 1024 * 1024;
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_upload_file()
            .withf(move |req, _| req.timeout == Some(upload_deadline(size)))
            .times(1)
            .returning(|_, _| Ok(response(200, "tok")));

        let dir = TempDir::new().unwrap();
        let file = photo(&dir, "clip.mov", size as usize);
        connector(mock_http).upload(&file, "clip.mov").await.unwrap();

        assert_eq!(upload_deadline(size), UPLOAD_BASE_TIMEOUT + Duration::from_secs(16));
        // 10 GiB at the slowest expected rate still fits
        let largest = upload_deadline(10 * 1024 * 1024 * 1024);
        assert!(largest >= Duration::from_secs(10 * 1024 * 4));
    }

    #[tokio::test]
    async fn test_upload_of_missing_file_never_reaches_http() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_upload_file().times(0);

        let dir = TempDir::new().unwrap();
        let result = connector(mock_http)
            .upload(&dir.path().join("gone.jpg"), "gone.jpg")
            .await;
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }

    #[tokio::test]
    async fn test_commit_created() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| {
                let body = body_json(req);
                req.url.ends_with("/mediaItems:batchCreate")
                    && body["albumId"] == "album-1"
                    && body["newMediaItems"][0]["description"] == "IMG_0001.jpg"
                    && body["newMediaItems"][0]["simpleMediaItem"]["uploadToken"] == "tok"
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"newMediaItemResults":[{"uploadToken":"tok","status":{"message":"Success"},"mediaItem":{"id":"m1"}}]}"#,
                ))
            });

        let status = connector(mock_http)
            .commit("album-1", "tok", "IMG_0001.jpg")
            .await
            .unwrap();
        assert_eq!(
            status,
            CommitStatus::Created {
                media_item_id: Some("m1".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_commit_rate_limited() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(429, "quota")));

        let status = connector(mock_http).commit("a", "t", "d").await.unwrap();
        assert_eq!(status, CommitStatus::RateLimited);
    }

    #[tokio::test]
    async fn test_commit_album_not_found() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, "not found")));

        let status = connector(mock_http).commit("gone", "t", "d").await.unwrap();
        assert_eq!(status, CommitStatus::AlbumNotFound);
    }

    #[tokio::test]
    async fn test_commit_item_level_failure() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(response(
                207,
                r#"{"newMediaItemResults":[{"uploadToken":"t","status":{"code":3,"message":"Invalid upload token"}}]}"#,
            ))
        });

        let status = connector(mock_http).commit("a", "t", "d").await.unwrap();
        assert_eq!(
            status,
            CommitStatus::Rejected {
                status: 207,
                message: "Invalid upload token".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_commit_other_status_rejected() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(500, "backend error")));

        let status = connector(mock_http).commit("a", "t", "d").await.unwrap();
        assert!(matches!(status, CommitStatus::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(0);

        let connector =
            GooglePhotosConnector::new(Arc::new(mock_http), Arc::new(StaticToken::new("")));
        let result = connector.create_album("x").await;
        assert!(matches!(result, Err(BridgeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_custom_base_url() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| req.url.starts_with("http://localhost:8080/v1/albums"))
            .times(1)
            .returning(|_| Ok(response(200, "{}")));

        let connector = connector(mock_http).with_base_url("http://localhost:8080/v1");
        let (albums, next) = connector.list_albums(None).await.unwrap();
        assert!(albums.is_empty());
        assert!(next.is_none());
    }
}
