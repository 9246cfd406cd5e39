//! # Authentication Module
//!
//! OAuth 2.0 token handling for the photo library connector.
//!
//! ## Overview
//!
//! Tokens are issued out of band and stored in a JSON token file. This crate
//! loads them, refreshes them through the refresh-token grant when they are
//! about to expire, and exposes them to connectors through
//! [`AccessTokenSource`].
//!
//! ## Features
//!
//! - Google client-secret file parsing
//! - Refresh-token grant with bounded retry on server errors
//! - Atomic file-backed token storage
//! - Static token source for externally supplied tokens

pub mod error;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::{AccessTokenSource, AuthManager, StaticToken};
pub use oauth::{OAuthConfig, OAuthFlowManager};
pub use token_store::TokenStore;
pub use types::{ClientCredentials, OAuthTokens, DEFAULT_TOKEN_URI};
