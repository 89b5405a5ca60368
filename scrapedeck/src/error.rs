//! Error types.

use thiserror::Error;

/// The main error type for scrapedeck operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-related error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Dashboard API returned an error response.
    #[error("API error [{code}]: {message}")]
    Api { code: String, message: String },

    /// Operation requires authentication but none was provided.
    #[error("Authentication required")]
    AuthRequired,

    /// A required field was missing in the response.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Invalid argument passed to an API method.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Credential storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Create an API error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a missing field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Error::MissingField(field.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Check if this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Api { code, .. } => code == "429" || code.starts_with('5'),
            _ => false,
        }
    }

    /// Check if this is an authentication error.
    ///
    /// A token validation that fails this way rejects the credential; any
    /// other failure only means the service could not answer.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::AuthRequired => true,
            Error::Api { code, .. } => code == "401" || code == "403",
            _ => false,
        }
    }
}

/// Result type alias for scrapedeck operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::api("401", "token expired");
        assert_eq!(format!("{}", e), "API error [401]: token expired");
    }

    #[test]
    fn test_retryable() {
        assert!(Error::api("503", "unavailable").is_retryable());
        assert!(Error::api("429", "slow down").is_retryable());
        assert!(!Error::api("401", "unauthorized").is_retryable());
        assert!(!Error::storage("disk full").is_retryable());
    }

    #[test]
    fn test_auth_error() {
        assert!(Error::AuthRequired.is_auth_error());
        assert!(Error::api("401", "unauthorized").is_auth_error());
        assert!(Error::api("403", "forbidden").is_auth_error());
        assert!(!Error::api("500", "boom").is_auth_error());
    }
}
