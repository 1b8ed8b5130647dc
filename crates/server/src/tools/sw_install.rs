//! sw_install tool implementation.
//!
//! Dispatches the install event, waits for it, then activates the worker.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use taximoto_client::ServiceWorker;

use crate::tools::json_result;

/// Output structure for the sw_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwInstallOutput {
    /// Cache that was populated.
    pub cache_name: String,
    /// Manifest URLs stored.
    pub urls: Vec<String>,
    /// Entries written by this install.
    pub stored: usize,
    /// Entries in the cache afterwards.
    pub total_entries: u64,
    /// Worker state after activation.
    pub state: String,
}

/// Implementation of the sw_install tool.
pub async fn install_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let report = worker.on_install().await?;
    worker.activate().await?;

    let output = SwInstallOutput {
        cache_name: report.cache_name,
        urls: report.urls,
        stored: report.stored,
        total_entries: report.total_entries,
        state: worker.state().await.to_string(),
    };

    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taximoto_client::{Scope, WorkerState, testing::StubFetcher};
    use taximoto_core::CacheDb;

    const ORIGIN: &str = "http://localhost:8000";

    async fn worker(fetcher: StubFetcher) -> ServiceWorker {
        let storage = CacheDb::open_in_memory().await.unwrap();
        ServiceWorker::new(storage, Arc::new(fetcher), Scope::new(ORIGIN, "/").unwrap())
    }

    #[tokio::test]
    async fn test_install_impl_activates() {
        let worker = worker(StubFetcher::serving_manifest(ORIGIN)).await;

        let result = install_impl(&worker).await;

        assert!(result.is_ok());
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_install_impl_reports_failure() {
        let worker = worker(
            StubFetcher::serving_manifest(ORIGIN).respond("http://localhost:8000/static/manifest.json", 404, b""),
        )
        .await;

        let err = install_impl(&worker).await.unwrap_err();

        assert_eq!(err.code.0, -32020);
        assert_eq!(worker.state().await, WorkerState::Redundant);
    }
}
