//! cache_keys tool implementation.
//!
//! Lists the request descriptors stored in a named cache.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use taximoto_client::CACHE_NAME;
use taximoto_core::{CacheDb, CachedRequest};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Cache to list (default: the worker's cache, "taximoto-cache-v1").
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub cache_name: String,
    pub count: usize,
    pub requests: Vec<CachedRequest>,
}

/// Implementation of the cache_keys tool.
///
/// Never creates the cache: listing an unknown name is an error.
pub async fn keys_impl(storage: &CacheDb, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let cache_name = params.cache_name.unwrap_or_else(|| CACHE_NAME.to_string());

    if !storage.has_cache(&cache_name).await? {
        return Err(ToolError::InvalidInput(format!("no cache named {cache_name}")).into());
    }

    let requests = storage.open_cache(&cache_name).await?.keys().await?;
    let output = CacheKeysOutput { cache_name, count: requests.len(), requests };

    Ok(json_result(&output)?)
}
