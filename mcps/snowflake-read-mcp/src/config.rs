//! Configuration for the Snowflake read-only MCP server
//!
//! The connection can be supplied in three ways, highest priority first:
//! 1. `--connection '<json>'` (or `SNOWFLAKE_CONNECTION`)
//! 2. `--config <path>` (or `SNOWFLAKE_READ_CONFIG_PATH`), a TOML file
//! 3. `~/.binks/snowflake.toml`
//!
//! Both file and JSON forms accept the legacy `user` field in place of
//! `username`.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// How long a successful liveness check is trusted
pub const CONNECTION_CACHE_TTL: Duration = Duration::from_secs(60);

/// How long a table listing is served from cache
pub const TABLES_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors raised while resolving the connection configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("username or user is not set")]
    MissingUsername,

    #[error("required connection field '{0}' is empty")]
    MissingField(&'static str),

    #[error("connection info is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("no connection configured: pass --connection or create {0:?}")]
    NotConfigured(PathBuf),

    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Connection fields as they appear on the wire, before validation
#[derive(Deserialize)]
struct RawConnectionConfig {
    #[serde(default)]
    account: String,
    username: Option<String>,
    user: Option<String>,
    #[serde(default)]
    password: String,
    warehouse: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    role: Option<String>,
    #[serde(alias = "accessUrl")]
    access_url: Option<String>,
}

/// Validated, immutable Snowflake connection settings
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConnectionConfig")]
pub struct ConnectionConfig {
    pub account: String,
    pub username: String,
    pub password: String,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
    /// Overrides `https://<account>.snowflakecomputing.com`
    pub access_url: Option<String>,
}

impl TryFrom<RawConnectionConfig> for ConnectionConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConnectionConfig) -> Result<Self, Self::Error> {
        // The legacy `user` field takes precedence over `username`.
        let username = raw
            .user
            .filter(|u| !u.is_empty())
            .or(raw.username.filter(|u| !u.is_empty()))
            .ok_or(ConfigError::MissingUsername)?;

        if raw.account.trim().is_empty() {
            return Err(ConfigError::MissingField("account"));
        }
        if raw.password.is_empty() {
            return Err(ConfigError::MissingField("password"));
        }

        Ok(Self {
            account: raw.account,
            username,
            password: raw.password,
            warehouse: raw.warehouse,
            database: raw.database,
            schema: raw.schema,
            role: raw.role,
            access_url: raw.access_url,
        })
    }
}

impl ConnectionConfig {
    /// Parse a connection from its JSON form
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConnectionConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Base URL of the account's REST endpoint, without a trailing slash
    pub fn base_url(&self) -> String {
        match &self.access_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }

    /// Account name as Snowflake expects it at login (region suffix removed)
    pub fn account_name(&self) -> &str {
        self.account.split('.').next().unwrap_or(&self.account)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account", &self.account)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("access_url", &self.access_url)
            .finish()
    }
}

/// Contents of the TOML config file
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeConfig {
    pub connection: ConnectionConfig,
}

impl SnowflakeConfig {
    /// Default config location: `~/.binks/snowflake.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::home_dir()
            .ok_or(ConfigError::NoHomeDir)?
            .join(".binks")
            .join("snowflake.toml"))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolve the connection from the CLI sources in priority order
pub fn resolve_connection(
    json: Option<&str>,
    config_path: Option<&Path>,
) -> Result<ConnectionConfig, ConfigError> {
    if let Some(json) = json {
        return ConnectionConfig::from_json(json);
    }

    if let Some(path) = config_path {
        return Ok(SnowflakeConfig::load(path)?.connection);
    }

    let path = SnowflakeConfig::default_path()?;
    if !path.exists() {
        return Err(ConfigError::NotConfigured(path));
    }
    Ok(SnowflakeConfig::load(&path)?.connection)
}
