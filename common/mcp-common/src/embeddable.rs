//! Embeddable MCP trait for in-process execution
//!
//! [`EmbeddableMcp`] lets a host call an MCP server's tools and read its
//! resources directly, without spawning a subprocess or speaking the
//! protocol over stdio. Integration tests use the same entry points.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::EmbeddableMcp;
//! use snowflake_read_mcp::SnowflakeReadServer;
//!
//! let server = SnowflakeReadServer::new(gateway);
//!
//! let result = server
//!     .call_tool("query", serde_json::json!({ "sql": "SELECT CURRENT_DATE" }))
//!     .await?;
//! let tables = server.read_resource("snowflake://tables").await?;
//! ```

use async_trait::async_trait;
use rmcp::model::{CallToolResult, ReadResourceResult, Resource, ResourceTemplate, Tool};
use serde_json::Value;

/// Error type for embeddable MCP operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    /// Tool was not found in the server
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Resource URI is not served by this server
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Invalid parameters passed to the tool
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// MCP protocol error returned by the handler
    #[error("mcp error: {0}")]
    McpError(String),
}

impl From<rmcp::ErrorData> for EmbeddableError {
    fn from(err: rmcp::ErrorData) -> Self {
        EmbeddableError::McpError(err.message.to_string())
    }
}

/// Result type for embeddable MCP operations
pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

/// Trait for MCP servers that can be executed in-process
///
/// Implementations must be `Send + Sync` so a host can share one server
/// between tasks.
#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    /// Returns the server name for identification
    fn server_name(&self) -> &str;

    /// Returns a list of all available tools
    fn list_tools(&self) -> Vec<Tool>;

    /// Executes a tool by name with JSON parameters
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult>;

    /// Concrete resources the server exposes
    fn list_resources(&self) -> Vec<Resource> {
        Vec::new()
    }

    /// URI templates the server can resolve
    fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        Vec::new()
    }

    /// Reads a resource by URI
    async fn read_resource(&self, uri: &str) -> EmbeddableResult<ReadResourceResult> {
        Err(EmbeddableError::ResourceNotFound(uri.to_string()))
    }

    /// Returns an optional description of the server
    fn server_description(&self) -> Option<&str> {
        None
    }
}
