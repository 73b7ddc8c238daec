//! Error types for the query gateway
//!
//! Three kinds reach callers: policy rejections (never touched the
//! warehouse), connection failures (prefixed so they are easy to spot in
//! logs), and execution failures (the warehouse's message, verbatim).

use mcp_common::{IntoMcpError, McpError};
use thiserror::Error;

use crate::driver::DriverError;
use crate::guard::PolicyRejection;

/// Stable prefix carried by every connection-layer error message
pub const CONNECTION_ERROR_PREFIX: &str = "Snowflake connection failed";

/// Errors surfaced by [`crate::QueryGateway`]
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The read-only guard refused the input
    #[error("rejected by read-only policy: {0}")]
    Policy(#[from] PolicyRejection),

    /// Handshake, liveness check, or teardown failed
    #[error("Snowflake connection failed: {0}")]
    Connection(#[source] DriverError),

    /// The warehouse rejected an accepted statement
    #[error("{0}")]
    Execution(#[source] DriverError),
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Classify an error returned while executing a statement
    pub fn from_execute(err: DriverError) -> Self {
        if err.is_execution_failure() {
            GatewayError::Execution(err)
        } else {
            GatewayError::Connection(err)
        }
    }

    pub fn is_policy(&self) -> bool {
        matches!(self, GatewayError::Policy(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, GatewayError::Connection(_))
    }
}

impl IntoMcpError for GatewayError {
    fn into_mcp_error(self) -> McpError {
        match self {
            GatewayError::Policy(_) => McpError::invalid_params(self.to_string(), None),
            _ => McpError::internal_error(self.to_string(), None),
        }
    }
}

impl From<GatewayError> for McpError {
    fn from(err: GatewayError) -> Self {
        err.into_mcp_error()
    }
}
