//! Scripted in-memory driver for unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverError, Row, Session};

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::from_json(
        r#"{"account":"xy12345","user":"reader","password":"pw","warehouse":"COMPUTE_WH"}"#,
    )
    .unwrap()
}

/// Build a row from `(column, value)` pairs, keeping their order
pub fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, Vec<Row>>,
    failures: HashMap<String, String>,
    executed: Vec<String>,
}

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    health_checks: AtomicUsize,
    destroys: AtomicUsize,
}

pub struct FakeDriver {
    script: Arc<Mutex<Script>>,
    counters: Arc<Counters>,
    connect_error: Mutex<Option<String>>,
    connect_delay: Duration,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            counters: Arc::new(Counters::default()),
            connect_error: Mutex::new(None),
            connect_delay: Duration::ZERO,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Answer `sql` with `rows`
    pub fn respond(&self, sql: &str, rows: Vec<Row>) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(sql.to_string(), rows);
    }

    /// Make `sql` fail with a database rejection
    pub fn fail_statement(&self, sql: &str, message: &str) {
        self.script
            .lock()
            .unwrap()
            .failures
            .insert(sql.to_string(), message.to_string());
    }

    pub fn clear_failures(&self) {
        self.script.lock().unwrap().failures.clear();
    }

    pub fn fail_connect(&self, message: &str) {
        *self.connect_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn allow_connect(&self) {
        *self.connect_error.lock().unwrap() = None;
    }

    /// Connect attempts, successful or not
    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Session validity checks
    pub fn health_checks(&self) -> usize {
        self.counters.health_checks.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.counters.destroys.load(Ordering::SeqCst)
    }

    /// Every statement executed on any session, in order
    pub fn executed(&self) -> Vec<String> {
        self.script.lock().unwrap().executed.clone()
    }

    pub fn last_session(&self) -> Option<Arc<FakeSession>> {
        self.sessions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn Session>, DriverError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }

        if let Some(message) = self.connect_error.lock().unwrap().clone() {
            return Err(DriverError::Transport(message));
        }

        let session = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = Arc::new(FakeSession {
                id: sessions.len(),
                up: AtomicBool::new(true),
                valid: AtomicBool::new(true),
                destroy_error: Mutex::new(None),
                statements: Mutex::new(Vec::new()),
                script: self.script.clone(),
                counters: self.counters.clone(),
            });
            sessions.push(session.clone());
            session
        };
        Ok(session)
    }
}

pub struct FakeSession {
    id: usize,
    up: AtomicBool,
    valid: AtomicBool,
    destroy_error: Mutex<Option<String>>,
    statements: Mutex<Vec<String>>,
    script: Arc<Mutex<Script>>,
    counters: Arc<Counters>,
}

impl FakeSession {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    pub fn fail_destroy(&self, message: &str) {
        *self.destroy_error.lock().unwrap() = Some(message.to_string());
    }

    /// Statements executed on this session
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for FakeSession {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn is_valid(&self) -> bool {
        self.counters.health_checks.fetch_add(1, Ordering::SeqCst);
        self.valid.load(Ordering::SeqCst)
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        if !self.up.load(Ordering::SeqCst) {
            return Err(DriverError::SessionClosed);
        }
        self.statements.lock().unwrap().push(sql.to_string());

        let mut script = self.script.lock().unwrap();
        script.executed.push(sql.to_string());

        if let Some(message) = script.failures.get(sql) {
            return Err(DriverError::Rejected {
                code: Some("002003".to_string()),
                message: message.clone(),
            });
        }
        Ok(script.responses.get(sql).cloned().unwrap_or_default())
    }

    async fn destroy(&self) -> Result<(), DriverError> {
        self.counters.destroys.fetch_add(1, Ordering::SeqCst);
        self.up.store(false, Ordering::SeqCst);
        match self.destroy_error.lock().unwrap().clone() {
            Some(message) => Err(DriverError::Transport(message)),
            None => Ok(()),
        }
    }
}
