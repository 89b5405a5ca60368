//! User models.

use serde::{Deserialize, Serialize};

use super::UserId;

/// An authenticated dashboard identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role on the scraping service (admin, normal, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl User {
    /// Create a user with only an ID.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Name to show in the UI, falling back to the ID.
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() {
            self.id.as_str()
        } else {
            &self.username
        }
    }
}

/// Successful login exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token to persist.
    pub token: String,
    /// Identity the token belongs to.
    pub user: User,
}
