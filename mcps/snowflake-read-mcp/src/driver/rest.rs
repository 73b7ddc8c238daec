//! Snowflake REST driver
//!
//! Speaks the session protocol used by the official connectors:
//! `login-request` for the handshake, `query-request` for statements,
//! `heartbeat` for validity checks and `DELETE`-style session close.
//! Results are requested in JSON format and converted into [`Row`]s.
//!
//! An expired session token is renewed with the master token from login
//! (`token-request`, `RENEW`) and the statement is retried once. If renewal
//! fails the session reports itself down so the manager opens a new one.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{Driver, DriverError, Row, Session};
use crate::config::ConnectionConfig;

const CLIENT_APP_ID: &str = "snowflake-read-mcp";
const SNOWFLAKE_ACCEPT: &str = "application/snowflake";

/// Statement accepted, result not ready yet
const QUERY_IN_PROGRESS: &str = "333333";
const QUERY_IN_PROGRESS_ASYNC: &str = "333334";
/// Session token no longer accepted
const SESSION_EXPIRED: &str = "390112";

const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Driver backed by Snowflake's REST endpoints
pub struct SnowflakeRestDriver {
    client: Client,
}

impl SnowflakeRestDriver {
    pub fn new() -> Result<Self, DriverError> {
        let client = Client::builder()
            .user_agent(concat!("snowflake-read-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// Envelope every Snowflake response is wrapped in
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    message: Option<String>,
    code: Option<Value>,
    #[serde(default)]
    success: bool,
}

impl<T> Envelope<T> {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    fn into_data(self) -> Result<Option<T>, DriverError> {
        if self.success {
            return Ok(self.data);
        }
        Err(DriverError::Rejected {
            code: self.code(),
            message: self
                .message
                .unwrap_or_else(|| "request failed without a message".to_string()),
        })
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    data: LoginData<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: &'a str,
    login_name: &'a str,
    password: &'a str,
    session_parameters: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    master_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewRequest<'a> {
    old_session_token: &'a str,
    request_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewResponse {
    session_token: String,
    master_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    sequence_id: u64,
    async_exec: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    rowtype: Vec<ColumnType>,
    #[serde(default)]
    rowset: Vec<Vec<Value>>,
    chunks: Option<Vec<ChunkRef>>,
    chunk_headers: Option<HashMap<String, String>>,
    qrmk: Option<String>,
    get_result_url: Option<String>,
    query_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    scale: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChunkRef {
    url: String,
}

// ============================================================================
// Driver
// ============================================================================

#[async_trait]
impl Driver for SnowflakeRestDriver {
    #[instrument(skip_all, fields(account = %config.account, user = %config.username))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Session>, DriverError> {
        let base_url = config.base_url();
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut params: Vec<(&str, &str)> = vec![("request_id", request_id.as_str())];
        if let Some(warehouse) = &config.warehouse {
            params.push(("warehouse", warehouse.as_str()));
        }
        if let Some(database) = &config.database {
            params.push(("databaseName", database.as_str()));
        }
        if let Some(schema) = &config.schema {
            params.push(("schemaName", schema.as_str()));
        }
        if let Some(role) = &config.role {
            params.push(("roleName", role.as_str()));
        }

        let body = LoginRequest {
            data: LoginData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: env!("CARGO_PKG_VERSION"),
                account_name: config.account_name(),
                login_name: &config.username,
                password: &config.password,
                session_parameters: json!({ "QUERY_RESULT_FORMAT": "JSON" }),
            },
        };

        let response = self
            .client
            .post(format!("{}/session/v1/login-request", base_url))
            .query(&params)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let envelope: Envelope<LoginResponse> = read_envelope(response).await?;
        let login = envelope
            .into_data()?
            .ok_or_else(|| DriverError::Protocol("login response has no data".to_string()))?;

        debug!("login succeeded");

        Ok(Arc::new(RestSession {
            client: self.client.clone(),
            base_url,
            tokens: Mutex::new(Tokens {
                session: login.token,
                master: login.master_token,
            }),
            up: AtomicBool::new(true),
            sequence: AtomicU64::new(0),
        }))
    }
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, DriverError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(DriverError::Transport(format!("HTTP {}: {}", status, text)));
    }
    Ok(response.json().await?)
}

// ============================================================================
// Session
// ============================================================================

#[derive(Clone)]
struct Tokens {
    session: String,
    master: Option<String>,
}

/// A logged-in Snowflake session
struct RestSession {
    client: Client,
    base_url: String,
    tokens: Mutex<Tokens>,
    up: AtomicBool,
    sequence: AtomicU64,
}

impl RestSession {
    fn tokens(&self) -> Tokens {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn auth_header(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.tokens().session)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, DriverError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, SNOWFLAKE_ACCEPT)
            .json(body)
            .send()
            .await?;
        let envelope = read_envelope(response).await?;
        self.note_expiry(&envelope)?;
        Ok(envelope)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, DriverError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, SNOWFLAKE_ACCEPT)
            .send()
            .await?;
        let envelope = read_envelope(response).await?;
        self.note_expiry(&envelope)?;
        Ok(envelope)
    }

    fn note_expiry<T>(&self, envelope: &Envelope<T>) -> Result<(), DriverError> {
        if envelope.code().as_deref() == Some(SESSION_EXPIRED) {
            warn!("Snowflake session token expired");
            return Err(DriverError::SessionExpired);
        }
        Ok(())
    }

    /// Exchange the master token for a fresh session token.
    ///
    /// Any failure marks the session down.
    async fn renew(&self) -> Result<(), DriverError> {
        let result = self.request_renewal().await;
        match &result {
            Ok(()) => info!("Snowflake session token renewed"),
            Err(e) => {
                warn!(error = %e, "Snowflake session renewal failed");
                self.up.store(false, Ordering::SeqCst);
            }
        }
        result.map_err(|_| DriverError::SessionExpired)
    }

    async fn request_renewal(&self) -> Result<(), DriverError> {
        let tokens = self.tokens();
        let master = tokens.master.ok_or(DriverError::SessionExpired)?;

        let response = self
            .client
            .post(format!(
                "{}/session/token-request?requestId={}",
                self.base_url,
                uuid::Uuid::new_v4()
            ))
            .header(AUTHORIZATION, format!("Snowflake Token=\"{}\"", master))
            .header(ACCEPT, SNOWFLAKE_ACCEPT)
            .json(&RenewRequest {
                old_session_token: &tokens.session,
                request_type: "RENEW",
            })
            .send()
            .await?;

        let envelope: Envelope<RenewResponse> = read_envelope(response).await?;
        let renewed = envelope
            .into_data()?
            .ok_or_else(|| DriverError::Protocol("renewal response has no data".to_string()))?;

        let mut current = self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        current.session = renewed.session_token;
        if renewed.master_token.is_some() {
            current.master = renewed.master_token;
        }
        Ok(())
    }

    /// Submit one statement and collect its rows
    async fn run_statement(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        let request = QueryRequest {
            sql_text: sql,
            sequence_id: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            async_exec: false,
        };
        let path = format!(
            "/queries/v1/query-request?requestId={}",
            uuid::Uuid::new_v4()
        );

        let envelope = self.post(&path, &request).await?;
        let result = self.await_result(envelope).await?;

        let mut rows: Vec<Row> = result
            .rowset
            .into_iter()
            .map(|values| build_row(&result.rowtype, values))
            .collect();

        let chunks = result.chunks.unwrap_or_default();
        if !chunks.is_empty() {
            let supplied = result.chunk_headers.unwrap_or_default();
            let headers = chunk_headers(&supplied, result.qrmk.as_deref())?;
            for chunk in &chunks {
                let values = self.fetch_chunk(chunk, &headers).await?;
                rows.extend(values.into_iter().map(|v| build_row(&result.rowtype, v)));
            }
        }

        debug!(query_id = ?result.query_id, rows = rows.len(), "statement complete");
        Ok(rows)
    }

    /// Wait out "query in progress" answers until the result is ready
    async fn await_result(
        &self,
        mut envelope: Envelope<QueryResponse>,
    ) -> Result<QueryResponse, DriverError> {
        loop {
            let code = envelope.code();
            let in_progress = matches!(
                code.as_deref(),
                Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC)
            );
            if !in_progress {
                return envelope
                    .into_data()?
                    .ok_or_else(|| DriverError::Protocol("query response has no data".to_string()));
            }

            let result_url = envelope
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| {
                    DriverError::Protocol("query in progress without a result URL".to_string())
                })?;

            debug!(%result_url, "query still running, polling");
            tokio::time::sleep(RESULT_POLL_INTERVAL).await;
            envelope = self.get(&result_url).await?;
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &ChunkRef,
        headers: &HeaderMap,
    ) -> Result<Vec<Vec<Value>>, DriverError> {
        let response = self
            .client
            .get(&chunk.url)
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Transport(format!(
                "result chunk download failed with HTTP {}",
                status
            )));
        }

        // Chunks are a comma-separated list of row arrays without the enclosing brackets.
        let body = response.text().await?;
        serde_json::from_str(&format!("[{}]", body))
            .map_err(|e| DriverError::Protocol(format!("malformed result chunk: {}", e)))
    }
}

#[async_trait]
impl Session for RestSession {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn is_valid(&self) -> bool {
        if !self.is_up() {
            return false;
        }

        match self.post::<_, Value>("/session/heartbeat", &json!({})).await {
            Ok(envelope) => envelope.success,
            Err(e) => {
                debug!(error = %e, "heartbeat failed");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        if !self.is_up() {
            return Err(DriverError::SessionClosed);
        }

        match self.run_statement(sql).await {
            Err(DriverError::SessionExpired) => {
                self.renew().await?;
                self.run_statement(sql).await
            }
            result => result,
        }
    }

    async fn destroy(&self) -> Result<(), DriverError> {
        if !self.up.swap(false, Ordering::SeqCst) {
            debug!("session already closed");
            return Ok(());
        }

        let envelope: Envelope<Value> = self.post("/session?delete=true", &json!({})).await?;
        envelope.into_data().map(|_| ())
    }
}

fn chunk_headers(
    supplied: &HashMap<String, String>,
    qrmk: Option<&str>,
) -> Result<HeaderMap, DriverError> {
    let mut headers = HeaderMap::new();
    if !supplied.is_empty() {
        for (name, value) in supplied {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(bad_header)?;
            let value = HeaderValue::from_str(value).map_err(bad_header)?;
            headers.insert(name, value);
        }
    } else if let Some(key) = qrmk {
        headers.insert(
            "x-amz-server-side-encryption-customer-algorithm",
            HeaderValue::from_static("AES256"),
        );
        headers.insert(
            "x-amz-server-side-encryption-customer-key",
            HeaderValue::from_str(key).map_err(bad_header)?,
        );
    }
    Ok(headers)
}

fn bad_header(err: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(format!("bad chunk header: {}", err))
}

fn build_row(columns: &[ColumnType], values: Vec<Value>) -> Row {
    columns
        .iter()
        .zip(values)
        .map(|(column, value)| (column.name.clone(), convert_value(column, value)))
        .collect()
}

/// JSON result sets carry every value as a string; type them from the column metadata.
fn convert_value(column: &ColumnType, value: Value) -> Value {
    let Value::String(text) = value else {
        return value;
    };

    match column.kind.as_str() {
        "fixed" if column.scale.unwrap_or(0) == 0 => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        "fixed" | "real" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        "boolean" => match text.as_str() {
            "1" | "true" | "TRUE" => Value::Bool(true),
            "0" | "false" | "FALSE" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}
