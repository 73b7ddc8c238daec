//! Shared helpers for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use snowflake_read_mcp::{ConnectionConfig, Driver, DriverError, Row, Session};

pub fn config() -> ConnectionConfig {
    ConnectionConfig::from_json(
        r#"{"account":"xy12345","username":"reader","password":"secret","database":"ANALYTICS"}"#,
    )
    .unwrap()
}

pub fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// In-memory warehouse answering from a fixed script
#[derive(Default)]
pub struct ScriptedWarehouse {
    responses: Mutex<HashMap<String, Vec<Row>>>,
    errors: Mutex<HashMap<String, String>>,
    log: Mutex<Vec<String>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    session: Mutex<Option<Arc<ScriptedSession>>>,
}

impl ScriptedWarehouse {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, sql: &str, rows: Vec<Row>) {
        self.responses.lock().unwrap().insert(sql.to_string(), rows);
    }

    pub fn reject(&self, sql: &str, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .insert(sql.to_string(), message.to_string());
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Simulate the warehouse dropping the current session
    pub fn drop_session(&self) {
        if let Some(session) = self.session.lock().unwrap().as_ref() {
            session.up.store(false, Ordering::SeqCst);
        }
    }
}

pub struct WarehouseDriver(pub Arc<ScriptedWarehouse>);

#[async_trait]
impl Driver for WarehouseDriver {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn Session>, DriverError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(ScriptedSession {
            warehouse: self.0.clone(),
            up: AtomicBool::new(true),
        });
        *self.0.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }
}

pub struct ScriptedSession {
    warehouse: Arc<ScriptedWarehouse>,
    up: AtomicBool,
}

#[async_trait]
impl Session for ScriptedSession {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn is_valid(&self) -> bool {
        self.is_up()
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        self.warehouse.log.lock().unwrap().push(sql.to_string());

        if let Some(message) = self.warehouse.errors.lock().unwrap().get(sql) {
            return Err(DriverError::Rejected {
                code: Some("002003".to_string()),
                message: message.clone(),
            });
        }

        Ok(self
            .warehouse
            .responses
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .unwrap_or_default())
    }

    async fn destroy(&self) -> Result<(), DriverError> {
        self.up.store(false, Ordering::SeqCst);
        self.warehouse.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
