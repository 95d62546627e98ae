//! Network side of fetch interception.
//!
//! ### Request/Response Model
//! - `FetchRequest` and `FetchResponse` carry bodies as shared `Bytes`, so
//!   cloning never consumes a stream.
//! - Responses are classified `basic`/`cors`/`opaque` relative to the worker
//!   origin; only `basic` 200 responses are cache-eligible.
//!
//! ### URL Normalization
//! - Resolve relative paths against the worker origin
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Safety Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod request;
pub mod response;
pub mod url;

use asha_core::{AppConfig, Error};
use reqwest::Client;
use std::time::{Duration, Instant};

pub use request::{FetchRequest, RequestMode};
pub use response::{FetchResponse, ResponseType};
pub use reqwest::{Method, StatusCode};
pub use self::url::{UrlError, resolve, strip_fragment};

/// Anything that can perform a real network fetch.
///
/// The manager only ever talks to the network through this trait, so tests
/// substitute a recording double.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Perform `request`. Non-2xx statuses are responses, not errors; only a
    /// failure to obtain any response at all is an `Err`.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error>;
}

#[async_trait::async_trait]
impl<T: Network + ?Sized> Network for std::sync::Arc<T> {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
        (**self).fetch(request).await
    }
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "asha-sw/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "asha-sw/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Network`].
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
    origin: ::url::Url,
}

impl HttpNetwork {
    /// Create a network for a worker registered at `origin`.
    pub fn new(config: FetchConfig, origin: ::url::Url) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, origin })
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let FetchRequest { method, url, headers, body, mode } = request;

        if mode == RequestMode::SameOrigin && url.origin() != self.origin.origin() {
            return Err(Error::Network(format!("same-origin request to foreign origin: {url}")));
        }

        let mut builder = self.http.request(method.clone(), url.as_str()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{method} {url}: {e}")))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let response_type = ResponseType::classify(&self.origin, &final_url, mode);

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes, {})",
            method,
            url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len(),
            response_type.as_str()
        );

        Ok(FetchResponse { url: final_url, status, response_type, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> ::url::Url {
        ::url::Url::parse("http://localhost:5000").unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "asha-sw/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "custom/1.0".into(), timeout_ms: 1500, max_bytes: 1024, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "custom/1.0");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_http_network_new() {
        let network = HttpNetwork::new(FetchConfig::default(), origin());
        assert!(network.is_ok());
    }

    #[tokio::test]
    async fn test_same_origin_mode_refuses_foreign_url() {
        let network = HttpNetwork::new(FetchConfig::default(), origin()).unwrap();
        let request = FetchRequest::get(::url::Url::parse("https://example.com/").unwrap())
            .with_mode(RequestMode::SameOrigin);
        let result = network.fetch(request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config = FetchConfig { timeout: Duration::from_secs(2), ..Default::default() };
        let network = HttpNetwork::new(config, origin()).unwrap();
        let request = FetchRequest::get(::url::Url::parse("http://127.0.0.1:9/").unwrap());
        let result = network.fetch(request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    #[ignore = "requires network"]
    async fn test_fetch_cross_origin_is_cors() {
        let network = HttpNetwork::new(FetchConfig::default(), origin()).unwrap();
        let request = FetchRequest::get(::url::Url::parse("https://example.com/").unwrap());
        let response = network.fetch(request).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Cors);
        assert!(response.ok());
    }
}
