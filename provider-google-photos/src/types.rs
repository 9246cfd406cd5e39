//! Google Photos Library API request and response types
//!
//! See: https://developers.google.com/photos/library/reference/rest

use serde::{Deserialize, Serialize};

/// albums.create request body
#[derive(Debug, Serialize)]
pub struct CreateAlbumRequest<'a> {
    pub album: NewAlbum<'a>,
}

#[derive(Debug, Serialize)]
pub struct NewAlbum<'a> {
    pub title: &'a str,
}

/// Album resource (only the fields the sync engine reads)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,

    /// Untitled albums omit the field
    #[serde(default)]
    pub title: String,
}

/// albums.list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumsListResponse {
    /// Absent when the account has no albums
    #[serde(default)]
    pub albums: Vec<Album>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// mediaItems.batchCreate request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateRequest<'a> {
    pub album_id: &'a str,
    pub new_media_items: Vec<NewMediaItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItem<'a> {
    pub description: &'a str,
    pub simple_media_item: SimpleMediaItem<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMediaItem<'a> {
    pub upload_token: &'a str,
}

/// mediaItems.batchCreate response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResponse {
    #[serde(default)]
    pub new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItemResult {
    #[serde(default)]
    pub status: Option<ItemStatus>,

    #[serde(default)]
    pub media_item: Option<MediaItem>,
}

/// google.rpc.Status; a missing or zero code means success
#[derive(Debug, Deserialize)]
pub struct ItemStatus {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaItem {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_create_request_shape() {
        let request = BatchCreateRequest {
            album_id: "album-1",
            new_media_items: vec![NewMediaItem {
                description: "IMG_0001.jpg",
                simple_media_item: SimpleMediaItem {
                    upload_token: "tok",
                },
            }],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["albumId"], "album-1");
        assert_eq!(value["newMediaItems"][0]["description"], "IMG_0001.jpg");
        assert_eq!(
            value["newMediaItems"][0]["simpleMediaItem"]["uploadToken"],
            "tok"
        );
    }

    #[test]
    fn test_albums_list_empty_account() {
        let response: AlbumsListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.albums.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_untitled_album() {
        let album: Album = serde_json::from_str(r#"{"id":"a1","productUrl":"x"}"#).unwrap();
        assert_eq!(album.id, "a1");
        assert!(album.title.is_empty());
    }
}
