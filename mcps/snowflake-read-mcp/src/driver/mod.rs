//! Upstream database driver abstraction
//!
//! The connection manager only ever talks to these traits. The production
//! implementation is [`rest::SnowflakeRestDriver`]; tests plug in fakes.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ConnectionConfig;

pub mod rest;

pub use rest::SnowflakeRestDriver;

/// One result row: column name to value, in the order the warehouse returned them
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Errors reported by a driver
#[derive(Debug, Error)]
pub enum DriverError {
    /// The request never produced a usable response (network, TLS, HTTP status)
    #[error("{0}")]
    Transport(String),

    /// The response could not be understood
    #[error("unexpected response from Snowflake: {0}")]
    Protocol(String),

    /// Snowflake answered and refused the request
    #[error("{message}")]
    Rejected {
        code: Option<String>,
        message: String,
    },

    /// The session was already closed locally
    #[error("session is closed")]
    SessionClosed,

    /// The session token expired and could not be renewed
    #[error("session expired")]
    SessionExpired,
}

impl DriverError {
    /// True when the database itself rejected a statement, as opposed to
    /// the session or transport failing underneath it. Expired and closed
    /// sessions are connection failures.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, DriverError::Rejected { .. })
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DriverError::Protocol(err.to_string())
        } else {
            DriverError::Transport(err.to_string())
        }
    }
}

/// Opens sessions against the warehouse
#[async_trait]
pub trait Driver: Send + Sync {
    /// Perform the connect handshake and return an authenticated session
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Session>, DriverError>;
}

/// An authenticated session
#[async_trait]
pub trait Session: Send + Sync {
    /// Cheap local flag: has this session been established and not torn down?
    fn is_up(&self) -> bool;

    /// Ask the warehouse whether the session is still valid, without running SQL
    async fn is_valid(&self) -> bool;

    /// Execute one statement and collect every row
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DriverError>;

    /// Close the session
    async fn destroy(&self) -> Result<(), DriverError>;
}
