//! Outbound request model.

use bytes::Bytes;
use reqwest::{Method, header::HeaderMap};
use url::Url;

/// How cross-origin responses are exposed to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Cross-origin responses are readable (CORS).
    #[default]
    Cors,
    /// Cross-origin responses come back opaque.
    NoCors,
    /// Cross-origin requests are refused outright.
    SameOrigin,
}

/// An intercepted request.
///
/// Bodies are shared `Bytes`, so `clone()` yields an independent copy that can
/// be forwarded to the network while the original stays readable.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: None, mode: RequestMode::default() }
    }

    /// A plain `GET` in CORS mode.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Only `GET` requests are looked up in or written to a generation.
    pub fn is_cacheable_method(&self) -> bool {
        self.method == Method::GET
    }
}
