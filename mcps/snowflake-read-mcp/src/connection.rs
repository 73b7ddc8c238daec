//! Snowflake connection manager
//!
//! Owns the single upstream session. The session is created lazily,
//! verified at most once per [`CONNECTION_CACHE_TTL`](crate::config::CONNECTION_CACHE_TTL)
//! window, replaced when the driver reports it dead, and closed on shutdown.
//!
//! Every operation holds the state lock for its whole duration, so two
//! callers can never race to open two sessions.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ConnectionConfig;
use crate::driver::{Driver, Session};
use crate::error::{GatewayError, GatewayResult};

/// Mutable connection state, only touched under the manager's lock
#[derive(Default)]
struct ConnectionState {
    handle: Option<Arc<dyn Session>>,
    last_verified_at: Option<Instant>,
}

impl ConnectionState {
    fn verified_within(&self, ttl: Duration) -> bool {
        self.handle.is_some()
            && self
                .last_verified_at
                .is_some_and(|verified| verified.elapsed() < ttl)
    }

    fn clear(&mut self) {
        self.handle = None;
        self.last_verified_at = None;
    }
}

/// Lazily connected, self-healing owner of the upstream session
pub struct ConnectionManager {
    config: ConnectionConfig,
    driver: Arc<dyn Driver>,
    verify_ttl: Duration,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, driver: Arc<dyn Driver>, verify_ttl: Duration) -> Self {
        Self {
            config,
            driver,
            verify_ttl,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Return the current session, connecting first if there is none.
    ///
    /// An existing session is returned as-is; liveness is only checked by
    /// [`test_connection`](Self::test_connection).
    pub async fn ensure_connection(&self) -> GatewayResult<Arc<dyn Session>> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await
    }

    /// Health check, safe to call repeatedly.
    ///
    /// Within the TTL of the last successful check this costs nothing. After
    /// it, the driver's "is up" flag and session validity check are consulted
    /// (no SQL is run); if either fails the session is dropped and a new one
    /// is opened. There is exactly one reconnect attempt per call.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> GatewayResult<()> {
        let mut state = self.state.lock().await;

        if state.verified_within(self.verify_ttl) {
            debug!("Snowflake connection active (cached)");
            return Ok(());
        }

        let result = self.verify_locked(&mut state).await;
        if let Err(e) = &result {
            error!(error = %e, "Snowflake connection test failed");
        }
        result
    }

    async fn verify_locked(&self, state: &mut ConnectionState) -> GatewayResult<()> {
        let started = Instant::now();

        if let Some(session) = state.handle.clone() {
            if session.is_up() && session.is_valid().await {
                state.last_verified_at = Some(started);
                info!("Snowflake connection active (verified)");
                return Ok(());
            }

            warn!("Snowflake session is no longer valid, reconnecting");
            state.clear();
            self.connect_locked(state).await?;
            state.last_verified_at = Some(started);
            info!("Snowflake reconnected");
            return Ok(());
        }

        self.connect_locked(state).await?;
        state.last_verified_at = Some(started);
        info!("Snowflake connection established");
        Ok(())
    }

    async fn connect_locked(&self, state: &mut ConnectionState) -> GatewayResult<Arc<dyn Session>> {
        if let Some(session) = &state.handle {
            return Ok(session.clone());
        }

        info!(
            account = %self.config.account,
            username = %self.config.username,
            warehouse = ?self.config.warehouse,
            database = ?self.config.database,
            schema = ?self.config.schema,
            role = ?self.config.role,
            "Connecting to Snowflake"
        );

        match self.driver.connect(&self.config).await {
            Ok(session) => {
                state.handle = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                error!(error = %e, "Snowflake connection failed");
                state.clear();
                Err(GatewayError::Connection(e))
            }
        }
    }

    /// Close the session if one is open.
    ///
    /// The handle is forgotten once the close completes, even if it failed,
    /// so a dead session is never reused. The close error is still returned.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> GatewayResult<()> {
        let mut state = self.state.lock().await;

        let Some(session) = state.handle.clone() else {
            debug!("disconnect called with no open session");
            return Ok(());
        };

        let result = session.destroy().await;
        state.clear();

        match result {
            Ok(()) => {
                info!("Snowflake connection closed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Snowflake connection close failed");
                Err(GatewayError::Connection(e))
            }
        }
    }

    /// Forget the current session if the driver reports it down.
    ///
    /// Called after a connection-class failure so the next
    /// [`ensure_connection`](Self::ensure_connection) opens a fresh session
    /// instead of reusing a dead one. Returns whether a handle was dropped.
    pub async fn discard_if_down(&self) -> bool {
        let mut state = self.state.lock().await;
        match &state.handle {
            Some(session) if !session.is_up() => {
                warn!("Dropping Snowflake session reported down");
                state.clear();
                true
            }
            _ => false,
        }
    }

    /// True when a session handle is currently held
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.handle.is_some()
    }

    /// When the session last passed a liveness check
    pub async fn last_verified(&self) -> Option<Instant> {
        self.state.lock().await.last_verified_at
    }
}
