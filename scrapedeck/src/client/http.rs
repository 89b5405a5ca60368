//! HTTP client configuration and request execution.

use crate::error::{Error, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Default dashboard API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("scrapedeck/", env!("CARGO_PKG_VERSION"));

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL for API requests.
    pub base_url: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read timeout.
    pub read_timeout: Duration,
    /// Custom user agent.
    pub custom_user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(20),
            custom_user_agent: None,
        }
    }
}

impl HttpConfig {
    /// The user agent to send.
    pub fn user_agent(&self) -> &str {
        self.custom_user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Resolve a relative API path to a full URL.
    pub fn resolve_url(&self, api: &str) -> Result<Url> {
        if api.starts_with("http://") || api.starts_with("https://") {
            return Url::parse(api).map_err(Error::Url);
        }

        Url::parse(&self.base_url)
            .and_then(|b| b.join(api))
            .map_err(Error::Url)
    }
}

/// Build a reqwest client with the given configuration.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .gzip(true)
        .build()
        .map_err(Error::Network)
}

/// HTTP request executor.
pub struct HttpExecutor<'a> {
    client: &'a Client,
    config: &'a HttpConfig,
}

impl<'a> HttpExecutor<'a> {
    /// Create a new executor.
    pub fn new(client: &'a Client, config: &'a HttpConfig) -> Self {
        Self { client, config }
    }

    /// Build a request with common headers.
    fn build_request(&self, method: Method, url: Url, token: Option<&str>) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header(reqwest::header::USER_AGENT, self.config.user_agent())
            .header(reqwest::header::ACCEPT, "application/json");

        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET a JSON resource.
    pub async fn get_json<T: DeserializeOwned>(&self, api: &str, token: Option<&str>) -> Result<T> {
        let url = self.config.resolve_url(api)?;
        let response = self
            .build_request(Method::GET, url, token)
            .send()
            .await
            .map_err(Error::Network)?;

        let text = self.handle_response(response).await?;
        parse_json_response(&text)
    }

    /// POST a JSON body and decode the JSON reply.
    pub async fn post_json<B, T>(&self, api: &str, body: &B, token: Option<&str>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.post_raw(api, body, token).await?;
        parse_json_response(&text)
    }

    /// POST a JSON body and return the raw reply text.
    pub async fn post_raw<B>(&self, api: &str, body: &B, token: Option<&str>) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.resolve_url(api)?;
        let response = self
            .build_request(Method::POST, url, token)
            .json(body)
            .send()
            .await
            .map_err(Error::Network)?;

        self.handle_response(response).await
    }

    /// Turn non-2xx statuses into API errors.
    async fn handle_response(&self, response: Response) -> Result<String> {
        let status = response.status();
        let text = response.text().await.map_err(Error::Network)?;

        if !status.is_success() {
            let message = error_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_owned());
            return Err(Error::api(status.as_u16().to_string(), message));
        }

        Ok(text)
    }
}

/// Parse a JSON reply, unwrapping a `{"data": ...}` envelope if present.
pub(crate) fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T> {
    let mut value: serde_json::Value = serde_json::from_str(text).map_err(Error::Json)?;

    let enveloped = value.get("data").is_some_and(|data| !data.is_null());
    let payload = if enveloped { value["data"].take() } else { value };

    serde_json::from_value(payload).map_err(Error::Json)
}

/// Pull a human-readable message out of an error body.
fn error_message(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    ["error", "message", "detail"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Widget {
        id: String,
    }

    #[test]
    fn test_resolve_url() {
        let config = HttpConfig::default();

        let url = config.resolve_url("api/auth/me").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/auth/me");

        let absolute = config.resolve_url("https://example.com/x").unwrap();
        assert_eq!(absolute.as_str(), "https://example.com/x");
    }

    #[test]
    fn test_user_agent() {
        let mut config = HttpConfig::default();
        assert!(config.user_agent().starts_with("scrapedeck/"));

        config.custom_user_agent = Some("scrapedeck-test".into());
        assert_eq!(config.user_agent(), "scrapedeck-test");
    }

    #[test]
    fn test_parse_enveloped_response() {
        let widget: Widget = parse_json_response(r#"{"status":"ok","data":{"id":"u1"}}"#).unwrap();
        assert_eq!(widget, Widget { id: "u1".into() });
    }

    #[test]
    fn test_parse_bare_response() {
        let widget: Widget = parse_json_response(r#"{"id":"u2"}"#).unwrap();
        assert_eq!(widget, Widget { id: "u2".into() });
    }

    #[test]
    fn test_parse_garbage() {
        let result: Result<Widget> = parse_json_response("<html>");
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error":"token expired"}"#).as_deref(),
            Some("token expired")
        );
        assert_eq!(error_message("not json"), None);
    }
}
