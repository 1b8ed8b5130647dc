//! sw_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use taximoto_client::ServiceWorker;
use taximoto_core::Error;

use crate::tools::json_result;

/// Output structure for the sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusOutput {
    pub state: String,
    pub origin: String,
    pub scope: String,
    pub cache_name: String,
    /// Every cache in storage, oldest first.
    pub caches: Vec<String>,
}

/// Snapshot of the worker and its storage.
pub async fn status_output(worker: &ServiceWorker) -> Result<SwStatusOutput, Error> {
    Ok(SwStatusOutput {
        state: worker.state().await.to_string(),
        origin: worker.scope().origin().to_string(),
        scope: worker.scope().prefix().to_string(),
        cache_name: worker.cache_name().to_string(),
        caches: worker.storage().cache_names().await?,
    })
}

/// Implementation of the sw_status tool.
pub async fn status_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let output = status_output(worker).await?;
    Ok(json_result(&output)?)
}
