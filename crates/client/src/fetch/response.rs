//! Response model and conversion to and from stored entries.

use asha_core::{Error, StoredEntry};
use bytes::Bytes;
use reqwest::{
    Method, StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize};
use url::Url;

use super::request::RequestMode;

/// Pseudo-header recording the final URL when it differs from the key URL.
const FINAL_URL_HEADER: &str = ":final-url";

/// Platform response type, which decides cache eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin, fully readable.
    Basic,
    /// Cross-origin, readable via CORS.
    Cors,
    /// Cross-origin `no-cors`; status and body hidden from the page.
    Opaque,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            "opaque" => Ok(ResponseType::Opaque),
            other => Err(Error::CorruptEntry(format!("unknown response type: {other}"))),
        }
    }

    /// Classify a response that ended at `final_url` for a page at `origin`.
    pub fn classify(origin: &Url, final_url: &Url, mode: RequestMode) -> Self {
        if final_url.origin() == origin.origin() {
            ResponseType::Basic
        } else if mode == RequestMode::NoCors {
            ResponseType::Opaque
        } else {
            ResponseType::Cors
        }
    }
}

/// A network or cached response.
///
/// `body` is shared `Bytes`: cloning the response gives the store path and the
/// return path their own handle without copying or consuming anything.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: Url,
    pub status: StatusCode,
    pub response_type: ResponseType,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    /// 2xx status.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Eligible for opportunistic caching: exactly 200 and same-origin.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && self.response_type == ResponseType::Basic
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Snapshot this response as an entry keyed by `method key_url`.
    pub fn to_entry(&self, method: &Method, key_url: &Url) -> StoredEntry {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        let mut entry = StoredEntry::new(
            method.as_str(),
            key_url.as_str(),
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or(""),
            self.response_type.as_str(),
            headers,
            self.body.to_vec(),
        );
        if entry.url != self.url.as_str() {
            entry.headers.push((FINAL_URL_HEADER.to_string(), self.url.as_str().as_bytes().to_vec()));
        }
        entry
    }

    /// Rebuild a response from a stored entry.
    pub fn from_entry(entry: StoredEntry) -> Result<Self, Error> {
        let mut url = Url::parse(&entry.url).map_err(|e| Error::CorruptEntry(format!("url {}: {e}", entry.url)))?;
        let status = StatusCode::from_u16(entry.status)
            .map_err(|e| Error::CorruptEntry(format!("status {}: {e}", entry.status)))?;
        let response_type = ResponseType::parse(&entry.response_type)?;

        let mut headers = HeaderMap::with_capacity(entry.headers.len());
        for (name, value) in &entry.headers {
            if name == FINAL_URL_HEADER {
                let raw = String::from_utf8_lossy(value);
                url = Url::parse(&raw).map_err(|e| Error::CorruptEntry(format!("final url {raw}: {e}")))?;
                continue;
            }
            let value =
                HeaderValue::from_bytes(value).map_err(|e| Error::CorruptEntry(format!("header value of {name}: {e}")))?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("header name {name}: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self { url, status, response_type, headers, body: Bytes::from(entry.body) })
    }
}
