//! sw_fetch tool implementation.
//!
//! Routes one request through the worker's fetch handler and reports the
//! answer together with where it came from.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use taximoto_client::{ResponseSource, ServiceWorker};
use taximoto_core::Error;

use crate::tools::json_result;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path on the worker's origin (e.g. "/static/manifest.json").
    pub url: String,

    /// HTTP method (default: "GET").
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The URL requested, after resolution against the origin.
    pub url: String,
    /// The final URL after redirects.
    pub final_url: String,
    /// "cache", "network" or "uncontrolled".
    pub source: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body as text; absent when the body is not valid UTF-8.
    pub body: Option<String>,
    pub body_bytes: usize,
}

fn source_name(source: ResponseSource) -> &'static str {
    match source {
        ResponseSource::Cache => "cache",
        ResponseSource::Network => "network",
        ResponseSource::Uncontrolled => "uncontrolled",
    }
}

/// Intercept one request and describe the answer.
pub async fn fetch_output(worker: &ServiceWorker, params: SwFetchParams) -> Result<SwFetchOutput, Error> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }

    let request = worker.request(&params.method, &params.url)?;
    let answer = worker.on_fetch(request).await?;
    let response = answer.response;

    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    Ok(SwFetchOutput {
        url: response.url.to_string(),
        final_url: response.final_url.to_string(),
        source: source_name(answer.source).to_string(),
        status: response.status.as_u16(),
        content_type: response.content_type,
        headers,
        body: std::str::from_utf8(&response.bytes).ok().map(str::to_string),
        body_bytes: response.bytes.len(),
    })
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(worker: &ServiceWorker, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let output = fetch_output(worker, params).await?;
    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taximoto_client::{Scope, testing::StubFetcher};
    use taximoto_core::CacheDb;

    const ORIGIN: &str = "http://localhost:8000";

    fn params(url: &str) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: default_method() }
    }

    async fn active_worker(fetcher: Arc<StubFetcher>) -> ServiceWorker {
        let storage = CacheDb::open_in_memory().await.unwrap();
        let worker = ServiceWorker::new(storage, fetcher, Scope::new(ORIGIN, "/").unwrap());
        worker.on_install().await.unwrap();
        worker.activate().await.unwrap();
        worker
    }

    #[tokio::test]
    async fn test_fetch_root_from_cache() {
        let fetcher = Arc::new(StubFetcher::serving_manifest(ORIGIN));
        let worker = active_worker(fetcher.clone()).await;

        let output = fetch_output(&worker, params("/")).await.unwrap();

        assert_eq!(output.source, "cache");
        assert_eq!(output.status, 200);
        assert_eq!(output.url, "http://localhost:8000/");
        assert_eq!(output.body.as_deref(), Some("/"));
        assert_eq!(fetcher.call_count(), 4);
    }

    #[tokio::test]
    async fn test_fetch_api_from_network() {
        let fetcher = Arc::new(
            StubFetcher::serving_manifest(ORIGIN).respond_with(
                "http://localhost:8000/api/data",
                200,
                "application/json",
                b"[1,2]",
            ),
        );
        let worker = active_worker(fetcher.clone()).await;

        let output = fetch_output(&worker, params("http://localhost:8000/api/data")).await.unwrap();

        assert_eq!(output.source, "network");
        assert_eq!(output.content_type.as_deref(), Some("application/json"));
        assert_eq!(output.body.as_deref(), Some("[1,2]"));
        assert_eq!(fetcher.call_count(), 5);
    }

    #[tokio::test]
    async fn test_fetch_binary_body_omitted() {
        let fetcher = Arc::new(StubFetcher::serving_manifest(ORIGIN).respond_with(
            "http://localhost:8000/static/assets/img/image_1.png",
            200,
            "image/png",
            &[0x89, 0x50, 0xff, 0xfe],
        ));
        let worker = active_worker(fetcher).await;

        let output = fetch_output(&worker, params("/static/assets/img/image_1.png")).await.unwrap();

        assert_eq!(output.source, "cache");
        assert!(output.body.is_none());
        assert_eq!(output.body_bytes, 4);
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let worker = active_worker(Arc::new(StubFetcher::serving_manifest(ORIGIN))).await;
        let result = fetch_impl(&worker, params("  ")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_network_failure_propagates() {
        let fetcher =
            Arc::new(StubFetcher::serving_manifest(ORIGIN).fail("http://localhost:8000/api/data", "connection reset"));
        let worker = active_worker(fetcher).await;

        let err = fetch_impl(&worker, params("/api/data")).await.unwrap_err();
        assert_eq!(err.code.0, -32008);
    }
}
