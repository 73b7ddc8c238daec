//! Result helpers for MCP responses
//!
//! Tools and resources both return serialized data as pretty-printed JSON
//! text. These helpers keep that formatting identical across handlers.

use rmcp::{
    model::{CallToolResult, Content, ReadResourceResult, ResourceContents},
    ErrorData as McpError,
};
use serde::Serialize;

/// Media type tag attached to JSON resource contents
pub const JSON_MIME_TYPE: &str = "application/json";

fn to_pretty_json<T: Serialize>(data: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(data).map_err(|e| McpError::internal_error(e.to_string(), None))
}

/// Create a successful tool response from any serializable data
///
/// The data becomes a single text content item holding pretty-printed JSON.
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::json_success;
///
/// async fn query(&self, sql: &str) -> Result<CallToolResult, McpError> {
///     let rows = self.gateway.run_query(sql).await?;
///     json_success(&rows)
/// }
/// ```
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(to_pretty_json(
        data,
    )?)]))
}

/// Create a resource read response from any serializable data
///
/// The content is addressed by `uri` and tagged [`JSON_MIME_TYPE`].
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::json_resource;
///
/// let tables = self.gateway.list_tables().await?;
/// json_resource("snowflake://tables", &tables)
/// ```
pub fn json_resource<T: Serialize>(
    uri: impl Into<String>,
    data: &T,
) -> Result<ReadResourceResult, McpError> {
    let mut contents = ResourceContents::text(to_pretty_json(data)?, uri);
    if let ResourceContents::TextResourceContents { mime_type, .. } = &mut contents {
        *mime_type = Some(JSON_MIME_TYPE.to_string());
    }
    Ok(ReadResourceResult {
        contents: vec![contents],
    })
}
