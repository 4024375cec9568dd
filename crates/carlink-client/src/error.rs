//! Transport error types.

use thiserror::Error;

use crate::error_body::ApiErrorDetail;

/// Transport error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server refused the credentials (401, 403, 405).
    #[error("Security error ({status}): {message}")]
    Security {
        /// HTTP status code.
        status: u16,
        /// Human-readable message.
        message: String,
        /// Decoded error body, if any.
        detail: Option<ApiErrorDetail>,
    },

    /// Server returned an unexpected status or an error body.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error code from the body, or "unknown".
        code: String,
        /// Human-readable message.
        message: String,
        /// Decoded error body, if any.
        detail: Option<ApiErrorDetail>,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is an authentication/authorization failure.
    pub fn is_security(&self) -> bool {
        matches!(self, Error::Security { .. })
    }

    /// Check if the server reported 401.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }

    /// HTTP status for response-level errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Security { status, .. } | Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Decoded error body, if the server sent one.
    pub fn detail(&self) -> Option<&ApiErrorDetail> {
        match self {
            Error::Security { detail, .. } | Error::Api { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
