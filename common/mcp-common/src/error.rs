//! Error handling utilities for MCP servers
//!
//! Provides traits and helpers for turning library errors into protocol errors.

use rmcp::ErrorData as McpError;

/// Type alias for MCP handler results
pub type McpResult<T> = Result<T, McpError>;

/// Trait for converting errors into MCP-compatible errors
///
/// Implement this for a server's own error type to choose which protocol
/// error code each variant maps to, then add `From<MyError> for McpError`
/// so `?` works in handlers.
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::{IntoMcpError, McpError};
///
/// impl IntoMcpError for GatewayError {
///     fn into_mcp_error(self) -> McpError {
///         match self {
///             GatewayError::Policy(_) => McpError::invalid_params(self.to_string(), None),
///             _ => McpError::internal_error(self.to_string(), None),
///         }
///     }
/// }
/// ```
pub trait IntoMcpError {
    /// Convert this error into an MCP error
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for serde_json::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(format!("JSON error: {}", self), None)
    }
}

impl IntoMcpError for anyhow::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self.to_string(), None)
    }
}

impl IntoMcpError for String {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self, None)
    }
}

impl IntoMcpError for &str {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self.to_string(), None)
    }
}

/// Extension trait for Result types to convert to MCP errors
///
/// ```rust,ignore
/// use mcp_common::ResultExt;
///
/// let template: ResourceTemplate = serde_json::from_value(value).to_mcp_err()?;
/// ```
pub trait ResultExt<T> {
    /// Convert the error to an MCP error
    fn to_mcp_err(self) -> Result<T, McpError>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> Result<T, McpError> {
        self.map_err(|e| e.into_mcp_error())
    }
}

/// Create an internal error with a message
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// Create an invalid params error with a message
///
/// Use this when a request carries input the server refuses to act on.
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}

/// Create a resource-not-found error carrying the requested URI
pub fn resource_not_found(uri: &str) -> McpError {
    McpError::resource_not_found(
        format!("resource not found: {}", uri),
        Some(serde_json::json!({ "uri": uri })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[test]
    fn test_into_mcp_error_string() {
        let err = "test error".into_mcp_error();
        assert!(err.message.contains("test error"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<serde_json::Value, serde_json::Error> = serde_json::from_str("{oops");
        let err = result.to_mcp_err().unwrap_err();
        assert!(err.message.starts_with("JSON error"));
    }

    #[test]
    fn test_invalid_params() {
        let err = invalid_params("bad table name");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("bad table name"));
    }

    #[test]
    fn test_resource_not_found() {
        let err = resource_not_found("snowflake://nope");
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
        assert!(err.message.contains("snowflake://nope"));
        assert_eq!(err.data, Some(serde_json::json!({ "uri": "snowflake://nope" })));
    }
}
