//! Error types for vehicle actions.

use carlink_oauth::IdentityError;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors raised while sending or tracking vehicle actions.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Token could not be obtained.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] carlink_client::Error),

    /// Invalid request or unexpected response.
    #[error("API error: {0}")]
    Api(String),

    /// Request did not complete in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Response could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Credentials, PIN or token refused.
    pub fn is_security(&self) -> bool {
        match self {
            ApiError::Identity(e) => e.is_security(),
            ApiError::Transport(e) => e.is_security(),
            _ => false,
        }
    }
}
