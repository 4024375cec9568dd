//! Error types for the identity layer.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors that can occur while obtaining or refreshing tokens.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Credentials rejected, login blocked or a security token was refused.
    #[error("Security error: {0}")]
    Security(String),

    /// Unexpected response from a token or login endpoint.
    #[error("API error: {0}")]
    Api(String),

    /// Missing or inconsistent setup (no authenticator, unknown session group).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Login or refresh did not complete in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] carlink_client::Error),

    /// Token response could not be decoded.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IdentityError {
    /// True for explicit security failures and transport 401/403/405.
    pub fn is_security(&self) -> bool {
        match self {
            IdentityError::Security(_) => true,
            IdentityError::Transport(e) => e.is_security(),
            _ => false,
        }
    }
}

impl From<url::ParseError> for IdentityError {
    fn from(e: url::ParseError) -> Self {
        IdentityError::Transport(carlink_client::Error::InvalidUrl(e))
    }
}
