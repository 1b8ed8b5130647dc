//! MCP tool implementations.
//!
//! This module contains all tools exposed by the taximoto-sw host.

pub mod cache;
pub mod sw_fetch;
pub mod sw_install;
pub mod sw_status;

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::error::ToolError;

/// Wrap a serializable output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, ToolError> {
    let json = serde_json::to_string_pretty(output)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
