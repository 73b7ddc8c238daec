//! Query gateway
//!
//! Ties the guard, the connection manager and the table-listing cache
//! together for the three request shapes the server exposes.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::cache::CachedValue;
use crate::config::{ConnectionConfig, CONNECTION_CACHE_TTL, TABLES_CACHE_TTL};
use crate::connection::ConnectionManager;
use crate::driver::{Driver, Row};
use crate::error::{GatewayError, GatewayResult};
use crate::guard;

/// Statement used to enumerate tables
pub const LIST_TABLES_SQL: &str = "SHOW TABLES";

/// TTLs used by the gateway
#[derive(Debug, Clone, Copy)]
pub struct GatewaySettings {
    pub connection_ttl: Duration,
    pub tables_ttl: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            connection_ttl: CONNECTION_CACHE_TTL,
            tables_ttl: TABLES_CACHE_TTL,
        }
    }
}

/// Read-only entry point in front of the warehouse
pub struct QueryGateway {
    connection: ConnectionManager,
    tables: CachedValue<Vec<Row>>,
}

impl QueryGateway {
    pub fn new(config: ConnectionConfig, driver: Arc<dyn Driver>) -> Self {
        Self::with_settings(config, driver, GatewaySettings::default())
    }

    pub fn with_settings(
        config: ConnectionConfig,
        driver: Arc<dyn Driver>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            connection: ConnectionManager::new(config, driver, settings.connection_ttl),
            tables: CachedValue::new(settings.tables_ttl),
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Verify (or establish) the upstream connection
    pub async fn test_connection(&self) -> GatewayResult<()> {
        self.connection.test_connection().await
    }

    /// All tables visible to the session, served from cache for up to five minutes
    #[instrument(skip(self))]
    pub async fn list_tables(&self) -> GatewayResult<Vec<Row>> {
        self.tables
            .get_or_refresh(|| async move {
                info!("Refreshing table list");
                self.execute(LIST_TABLES_SQL).await
            })
            .await
    }

    /// Column definitions of one table. Never cached.
    #[instrument(skip(self))]
    pub async fn describe_table(&self, table: &str) -> GatewayResult<Vec<Row>> {
        guard::check_identifier(table)?;
        self.execute(&format!("DESCRIBE TABLE {}", table)).await
    }

    /// Run a read-only statement verbatim and return its rows unmodified
    #[instrument(skip(self, sql))]
    pub async fn run_query(&self, sql: &str) -> GatewayResult<Vec<Row>> {
        if let Err(rejection) = guard::check_read_only(sql) {
            info!(reason = %rejection, "Query rejected");
            return Err(rejection.into());
        }
        self.execute(sql).await
    }

    async fn execute(&self, sql: &str) -> GatewayResult<Vec<Row>> {
        let session = self.connection.ensure_connection().await?;
        debug!(sql, "Executing statement");
        match session.execute(sql).await.map_err(GatewayError::from_execute) {
            Ok(rows) => {
                debug!(rows = rows.len(), "Statement returned");
                Ok(rows)
            }
            Err(e) => {
                if e.is_connection() && self.connection.discard_if_down().await {
                    info!("Session lost; the next request reconnects");
                }
                Err(e)
            }
        }
    }

    /// Close the upstream connection and drop cached results
    pub async fn shutdown(&self) -> GatewayResult<()> {
        self.tables.invalidate().await;
        self.connection.disconnect().await
    }
}
