use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Invalid client credentials: {0}")]
    InvalidCredentials(String),

    #[error("Token refresh rejected with status {status}: {message}")]
    RefreshRejected { status: u16, message: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    /// Whether retrying later cannot help without user intervention
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            AuthError::NotAuthenticated(_)
                | AuthError::InvalidCredentials(_)
                | AuthError::RefreshRejected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_classification() {
        assert!(AuthError::NotAuthenticated("no token".into()).is_unrecoverable());
        assert!(AuthError::RefreshRejected {
            status: 400,
            message: "invalid_grant".into()
        }
        .is_unrecoverable());
        assert!(!AuthError::NetworkError("reset".into()).is_unrecoverable());
        assert!(!AuthError::OperationTimeout {
            operation: "token refresh".into()
        }
        .is_unrecoverable());
    }
}
