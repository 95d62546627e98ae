//! fetch: intercept a single request.

use asha_client::{BypassReason, CacheManager, FetchRequest, Method, Network, ResponseSource, resolve};
use asha_core::Error;
use serde::Serialize;

use crate::cli::FetchArgs;

/// Output of `fetch`.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutput {
    pub method: String,
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub source: ResponseSource,
    pub response_type: String,
    pub content_type: Option<String>,
    pub bytes: usize,
    /// A copy was written to the current generation.
    pub stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass: Option<BypassReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

pub async fn fetch_impl<N: Network>(manager: &CacheManager<N>, args: &FetchArgs) -> Result<FetchOutput, Error> {
    let url = resolve(&args.url, &manager.config().origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", args.url)))?;
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", args.method)))?;

    let mut request = FetchRequest::new(method, url).with_mode(args.mode.into());
    if let Some(data) = &args.data {
        request = request.with_body(data.clone());
    }

    let mut handled = manager.handle_fetch(&request).await?;

    // Keep the process alive until the background write lands.
    let stored = handled.is_storing() && handled.wait_until().await.is_ok();

    let response = &handled.response;
    Ok(FetchOutput {
        method: request.method.to_string(),
        url: request.url.to_string(),
        final_url: response.url.to_string(),
        status: response.status.as_u16(),
        source: handled.source,
        response_type: response.response_type.as_str().to_string(),
        content_type: response.content_type().map(String::from),
        bytes: response.body.len(),
        stored,
        bypass: handled.bypass.clone(),
        body: args.body.then(|| String::from_utf8_lossy(&response.body).into_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ModeArg;
    use crate::commands::run_impl;
    use crate::commands::tests::{StaticNetwork, manager};

    fn args(url: &str) -> FetchArgs {
        FetchArgs { url: url.to_string(), method: "GET".to_string(), data: None, mode: ModeArg::Cors, body: false }
    }

    #[tokio::test]
    async fn test_fetch_miss_then_hit() {
        let manager = manager(StaticNetwork::ok()).await;
        run_impl(&manager, &[]).await.unwrap();

        let first = fetch_impl(&manager, &args("/new-page")).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        assert!(first.stored);
        assert_eq!(first.url, "http://localhost:5000/new-page");

        let second = fetch_impl(&manager, &args("/new-page")).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert!(!second.stored);
    }

    #[tokio::test]
    async fn test_fetch_bypass_output() {
        let manager = manager(StaticNetwork::ok()).await;
        run_impl(&manager, &[]).await.unwrap();

        let output = fetch_impl(&manager, &args("https://api.x.ai/chat")).await.unwrap();
        assert_eq!(output.source, ResponseSource::Bypass);
        assert_eq!(output.response_type, "cors");
        assert!(!output.stored);

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["source"], "bypass");
        assert_eq!(json["bypass"]["reason"], "foreign_origin");
    }

    #[tokio::test]
    async fn test_fetch_includes_body_on_request() {
        let manager = manager(StaticNetwork::ok()).await;
        run_impl(&manager, &[]).await.unwrap();

        let output = fetch_impl(&manager, &FetchArgs { body: true, ..args("/a.css") }).await.unwrap();
        assert_eq!(output.body.as_deref(), Some("asset"));
        assert_eq!(output.bytes, 5);
    }

    #[tokio::test]
    async fn test_fetch_no_cors_cross_origin_is_opaque() {
        let manager = manager(StaticNetwork::ok()).await;
        run_impl(&manager, &[]).await.unwrap();

        let args = FetchArgs { mode: ModeArg::NoCors, ..args("https://fonts.googleapis.com/icon") };
        let output = fetch_impl(&manager, &args).await.unwrap();
        assert_eq!(output.source, ResponseSource::Bypass);
        assert_eq!(output.response_type, "opaque");
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_method() {
        let manager = manager(StaticNetwork::ok()).await;
        let result = fetch_impl(&manager, &FetchArgs { method: "NOT A METHOD".to_string(), ..args("/") }).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_fetch_offline_surfaces_error() {
        let manager = manager(StaticNetwork::offline()).await;
        let result = fetch_impl(&manager, &args("/a.css")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
