//! Error types for Google Photos provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Photos provider errors
#[derive(Error, Debug)]
pub enum GooglePhotosError {
    /// No usable access token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Photos API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Photos operations
pub type Result<T> = std::result::Result<T, GooglePhotosError>;

impl From<core_auth::AuthError> for GooglePhotosError {
    fn from(error: core_auth::AuthError) -> Self {
        GooglePhotosError::AuthenticationFailed(error.to_string())
    }
}

impl From<GooglePhotosError> for BridgeError {
    fn from(error: GooglePhotosError) -> Self {
        match error {
            GooglePhotosError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            GooglePhotosError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            GooglePhotosError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GooglePhotosError::BridgeError(e) => e,
        }
    }
}
