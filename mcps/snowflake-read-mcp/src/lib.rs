//! Snowflake Read MCP Library
//!
//! Read-only gateway to a Snowflake warehouse, served over MCP.
//! Statements pass a keyword guard before they reach the warehouse; a single
//! upstream session is verified lazily and the table list is cached.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use snowflake_read_mcp::{ConnectionConfig, QueryGateway, SnowflakeReadServer, SnowflakeRestDriver};
//!
//! let config = ConnectionConfig::from_json(r#"{"account":"xy12345","user":"reader","password":"..."}"#)?;
//! let gateway = Arc::new(QueryGateway::new(config, Arc::new(SnowflakeRestDriver::new()?)));
//! let server = SnowflakeReadServer::new(gateway);
//! // Use with in-memory transport or serve via stdio
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod server;

#[cfg(test)]
mod testing;

// Re-export main server type
pub use server::SnowflakeReadServer;

// Re-export parameter types for direct API usage
pub use server::{QueryParams, ResourceTarget};

pub use config::{resolve_connection, ConfigError, ConnectionConfig};
pub use connection::ConnectionManager;
pub use driver::{Driver, DriverError, Row, Session, SnowflakeRestDriver};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{GatewaySettings, QueryGateway};
