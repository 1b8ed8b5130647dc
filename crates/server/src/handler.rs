//! MCP server handler implementation.
//!
//! Routes tool calls to the worker hosted by this process.
use crate::tools::{
    cache::{CacheKeysParams, keys_impl},
    sw_fetch::{SwFetchParams, fetch_impl},
    sw_install::install_impl,
    sw_status::status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use taximoto_client::ServiceWorker;

/// The MCP server handler hosting one service worker.
#[derive(Clone)]
pub struct TaximotoServer {
    tool_router: ToolRouter<Self>,
    worker: ServiceWorker,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl TaximotoServer {
    /// Create a new server handler around a registered worker.
    pub fn new(worker: ServiceWorker) -> Self {
        Self { tool_router: Self::tool_router(), worker }
    }

    /// Run the install event, then activate the worker.
    #[tool(description = "Install the service worker: fetch the asset manifest into the taximoto-cache-v1 cache (all or nothing), then activate it.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    /// Route a request through the worker's fetch handler.
    #[tool(description = "Fetch a URL through the service worker. Cached responses are served without network access; misses are fetched live and not cached.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Report the worker lifecycle state, origin, scope and the caches in storage.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }

    #[tool(description = "List the requests stored in a named cache (default: taximoto-cache-v1).")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(self.worker.storage(), params.0).await
    }
}

impl ServerHandler for TaximotoServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "taximoto-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taximoto_client::{Scope, testing::StubFetcher};
    use taximoto_core::CacheDb;

    #[tokio::test]
    async fn test_router_lists_all_tools() {
        let storage = CacheDb::open_in_memory().await.unwrap();
        let worker = ServiceWorker::new(
            storage,
            Arc::new(StubFetcher::new()),
            Scope::new("http://localhost:8000", "/").unwrap(),
        );
        let server = TaximotoServer::new(worker);

        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();

        assert_eq!(names, vec!["cache_keys", "sw_fetch", "sw_install", "sw_status"]);
    }
}
