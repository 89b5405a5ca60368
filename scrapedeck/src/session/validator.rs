//! Seams to the token validation service.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{LoginResponse, User};

/// Checks a stored token with the server.
#[async_trait(?Send)]
pub trait TokenValidator {
    /// Return the identity behind `token`, or why it could not be confirmed.
    ///
    /// Errors for which [`Error::is_retryable`](crate::Error::is_retryable)
    /// holds are treated as "service unavailable"; anything else rejects
    /// the token.
    async fn validate(&self, token: &str) -> Result<User>;
}

/// Full auth backend used by [`Session`](super::Session).
#[async_trait(?Send)]
pub trait AuthBackend: TokenValidator {
    /// Exchange credentials for a token.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;

    /// Revoke a token on the server.
    async fn logout(&self, token: &str) -> Result<()>;
}
