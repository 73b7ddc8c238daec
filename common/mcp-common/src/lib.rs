//! MCP Common - Shared utilities for MCP servers
//!
//! This crate provides common functionality used across the MCP servers:
//!
//! - **Logging**: [`init_tracing`] (stderr) and [`init_file_tracing`]
//!   (size-rotated log file), both keeping stdout free for protocol frames
//! - **Results**: Helpers for building `CallToolResult` and
//!   `ReadResourceResult` responses from serializable data
//! - **Errors**: Traits for converting errors to MCP-compatible format
//! - **Embeddable**: [`EmbeddableMcp`] trait for in-process execution
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{json_resource, json_success};
//!
//! fn query(&self) -> Result<CallToolResult, McpError> {
//!     let rows = run_query()?;
//!     json_success(&rows)
//! }
//!
//! fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
//!     json_resource(uri, &load_tables()?)
//! }
//! ```

pub mod embeddable;
pub mod error;
pub mod init;
pub mod logfile;
pub mod result;

// Re-export commonly used items at crate root
pub use embeddable::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use error::{
    internal_error, invalid_params, resource_not_found, IntoMcpError, McpResult, ResultExt,
};
pub use init::{init_file_tracing, init_tracing};
pub use logfile::{RotatingFileWriter, DEFAULT_MAX_LOG_BYTES};
pub use tracing_appender::non_blocking::WorkerGuard;
pub use result::{json_resource, json_success, JSON_MIME_TYPE};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content, ReadResourceResult, Resource, ResourceTemplate, Tool},
    ErrorData as McpError,
};

// Re-export async_trait for implementing EmbeddableMcp
pub use async_trait::async_trait;
