//! Which requests the worker is allowed to intercept.

use serde::Serialize;
use url::Url;

/// Why a request was left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum BypassReason {
    /// Request targets another origin.
    ForeignOrigin(String),
    /// URL contains a configured exclusion pattern.
    Excluded(String),
}

/// Interception scope: the worker origin plus excluded URL substrings.
#[derive(Debug, Clone)]
pub struct Scope {
    origin: Url,
    exclude_patterns: Vec<String>,
}

impl Scope {
    pub fn new(origin: Url, exclude_patterns: Vec<String>) -> Self {
        Self { origin, exclude_patterns }
    }

    /// `Some(reason)` when the request must bypass the cache entirely.
    ///
    /// Origin is checked first; exclusion patterns match anywhere in the full
    /// URL string.
    pub fn bypass_reason(&self, url: &Url) -> Option<BypassReason> {
        if url.origin() != self.origin.origin() {
            return Some(BypassReason::ForeignOrigin(url.origin().ascii_serialization()));
        }

        self.exclude_patterns
            .iter()
            .find(|pattern| url.as_str().contains(pattern.as_str()))
            .map(|pattern| BypassReason::Excluded(pattern.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new(
            Url::parse("http://localhost:5000").unwrap(),
            vec!["api.x.ai".to_string(), "generativelanguage.googleapis.com".to_string()],
        )
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_same_origin_intercepted() {
        assert_eq!(scope().bypass_reason(&url("http://localhost:5000/static/css/style.css")), None);
    }

    #[test]
    fn test_foreign_origin_bypassed() {
        let reason = scope().bypass_reason(&url("https://fonts.googleapis.com/css2")).unwrap();
        assert_eq!(reason, BypassReason::ForeignOrigin("https://fonts.googleapis.com".to_string()));
    }

    #[test]
    fn test_port_and_scheme_are_part_of_origin() {
        assert!(scope().bypass_reason(&url("http://localhost:5001/a.css")).is_some());
        assert!(scope().bypass_reason(&url("https://localhost:5000/a.css")).is_some());
    }

    #[test]
    fn test_api_host_bypassed() {
        // Foreign origin wins when both apply.
        let reason = scope().bypass_reason(&url("https://api.x.ai/chat")).unwrap();
        assert!(matches!(reason, BypassReason::ForeignOrigin(_)));
    }

    #[test]
    fn test_exclusion_pattern_on_same_origin() {
        let reason = scope()
            .bypass_reason(&url("http://localhost:5000/proxy?target=api.x.ai"))
            .unwrap();
        assert_eq!(reason, BypassReason::Excluded("api.x.ai".to_string()));
    }

    #[test]
    fn test_no_patterns() {
        let scope = Scope::new(Url::parse("http://localhost:5000").unwrap(), Vec::new());
        assert!(scope.bypass_reason(&url("http://localhost:5000/api.x.ai")).is_none());
    }
}
