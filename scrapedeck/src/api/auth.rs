//! Auth API.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    client::ClientInner,
    error::{Error, Result},
    models::{LoginResponse, User},
    session::{AuthBackend, TokenValidator},
};

const LOGIN: &str = "api/auth/login";
const ME: &str = "api/auth/me";
const LOGOUT: &str = "api/auth/logout";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// API for session operations.
pub struct AuthApi {
    client: Arc<ClientInner>,
}

impl AuthApi {
    pub(crate) fn new(client: Arc<ClientInner>) -> Self {
        Self { client }
    }

    /// Exchange credentials for a token.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        if username.trim().is_empty() {
            return Err(Error::InvalidArgument("username must not be empty".into()));
        }

        let response: LoginResponse = self
            .client
            .executor()
            .post_json(LOGIN, &LoginRequest { username, password }, None)
            .await?;

        if response.token.trim().is_empty() {
            return Err(Error::missing("token"));
        }
        Ok(response)
    }

    /// Get the identity behind `token`.
    pub async fn me(&self, token: &str) -> Result<User> {
        if token.trim().is_empty() {
            return Err(Error::AuthRequired);
        }

        let user: User = self.client.executor().get_json(ME, Some(token)).await?;
        if user.id.is_empty() {
            return Err(Error::missing("id"));
        }
        Ok(user)
    }

    /// Revoke `token` on the server.
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.client
            .executor()
            .post_raw(LOGOUT, &serde_json::json!({}), Some(token))
            .await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl TokenValidator for AuthApi {
    async fn validate(&self, token: &str) -> Result<User> {
        self.me(token).await
    }
}

#[async_trait(?Send)]
impl AuthBackend for AuthApi {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        AuthApi::login(self, username, password).await
    }

    async fn logout(&self, token: &str) -> Result<()> {
        AuthApi::logout(self, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DashboardClient;

    #[tokio::test]
    async fn test_me_without_token_needs_auth() {
        let client = DashboardClient::builder().build().unwrap();
        let result = client.auth().me("").await;
        assert!(matches!(result, Err(Error::AuthRequired)));
    }

    #[tokio::test]
    async fn test_login_rejects_empty_username() {
        let client = DashboardClient::builder().build().unwrap();
        let result = client.auth().login(" ", "secret").await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
