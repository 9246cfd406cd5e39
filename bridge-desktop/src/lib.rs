//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with file uploads streamed from disk
//! - `MetadataEditor` using the external `exiftool` binary
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ExifToolEditor, ReqwestHttpClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let editor = ExifToolEditor::new(Duration::from_secs(30));
//!     println!("exiftool {}", editor.version().await?);
//!     Ok(())
//! }
//! ```

mod exiftool;
mod http;

pub use exiftool::ExifToolEditor;
pub use http::ReqwestHttpClient;
