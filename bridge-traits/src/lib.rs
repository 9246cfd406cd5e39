//! # Host Bridge Traits
//!
//! Platform abstraction traits implemented by the desktop adapters and the
//! remote photo service connector.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync engine and everything it
//! talks to outside the process. Each trait represents a capability the engine
//! requires but that is implemented elsewhere, so tests can substitute fakes.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with streaming upload
//! - [`PhotoLibrary`](library::PhotoLibrary) - Albums, uploads, and commits on the remote library
//! - [`MetadataEditor`](metadata::MetadataEditor) - Embedded capture-time read/write
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should convert platform-specific errors to `BridgeError` and include context
//! (file paths, status codes) in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared behind `Arc`.

pub mod error;
pub mod http;
pub mod library;
pub mod metadata;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use library::{CommitStatus, PhotoLibrary, RemoteAlbum};
pub use metadata::{MetadataEditor, METADATA_DATETIME_FORMAT};
