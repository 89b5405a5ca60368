//! HTTP client and configuration.

mod http;

pub use http::{HttpConfig, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

use crate::api::AuthApi;
use crate::error::Result;
use http::{build_client, HttpExecutor};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating DashboardClient.
#[derive(Debug, Default)]
pub struct DashboardClientBuilder {
    http_config: HttpConfig,
}

impl DashboardClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.http_config.base_url = url.into();
        self
    }

    /// Set custom user agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.http_config.custom_user_agent = Some(ua.into());
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.http_config.connect_timeout = timeout;
        self
    }

    /// Set read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.http_config.read_timeout = timeout;
        self
    }

    /// Build DashboardClient.
    pub fn build(self) -> Result<DashboardClient> {
        // Fail early on a malformed base URL rather than on the first call.
        self.http_config.resolve_url("")?;
        let http_client = build_client(&self.http_config)?;

        Ok(DashboardClient {
            inner: Arc::new(ClientInner {
                http: http_client,
                config: self.http_config,
            }),
        })
    }
}

/// Internal client state.
pub(crate) struct ClientInner {
    pub http: reqwest::Client,
    pub config: HttpConfig,
}

impl ClientInner {
    /// Create HTTP executor.
    pub fn executor(&self) -> HttpExecutor<'_> {
        HttpExecutor::new(&self.http, &self.config)
    }
}

/// Client for the scraping dashboard API.
#[derive(Clone)]
pub struct DashboardClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl DashboardClient {
    /// Create a new client builder.
    pub fn builder() -> DashboardClientBuilder {
        DashboardClientBuilder::new()
    }

    /// Get the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.inner.clone())
    }

    /// Configured base URL.
    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }
}

impl std::fmt::Debug for DashboardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardClient")
            .field("base_url", &self.inner.config.base_url)
            .finish()
    }
}
