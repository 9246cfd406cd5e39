//! # Google Photos Provider
//!
//! Implements the `PhotoLibrary` trait for the Google Photos Library API v1.
//!
//! ## Overview
//!
//! This module provides:
//! - Album creation and paginated album listing
//! - Raw-protocol media uploads streamed from disk
//! - `mediaItems:batchCreate` commits with per-item status interpretation
//! - Bearer authentication through `core_auth::AccessTokenSource`

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GooglePhotosConnector;
pub use error::{GooglePhotosError, Result};
