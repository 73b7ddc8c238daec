//! Snowflake Read MCP Server
//!
//! Serves read-only Snowflake access over stdio.
//!
//! Usage:
//!   snowflake-read-mcp --connection '{"account":"xy12345","user":"reader","password":"..."}'
//!   snowflake-read-mcp --config ./snowflake.toml --log-stderr -v

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use rmcp::ServiceExt;
use tracing::{error, info, warn};

use mcp_common::{init_file_tracing, init_tracing, WorkerGuard, DEFAULT_MAX_LOG_BYTES};
use snowflake_read_mcp::{resolve_connection, QueryGateway, SnowflakeReadServer, SnowflakeRestDriver};

const CRATE_NAME: &str = "snowflake_read_mcp";

#[derive(Parser)]
#[command(name = "snowflake-read-mcp", version)]
#[command(about = "Read-only Snowflake MCP server")]
struct Cli {
    /// Connection settings as a JSON object (account, user/username, password, warehouse, ...)
    #[arg(long, env = "SNOWFLAKE_CONNECTION", hide_env_values = true)]
    connection: Option<String>,

    /// TOML file with a [connection] table. Defaults to ~/.binks/snowflake.toml
    #[arg(long, env = "SNOWFLAKE_READ_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Directory for app.log. Defaults to <tmp>/snowflake-read-mcp
    #[arg(long, env = "SNOWFLAKE_READ_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log to stderr instead of the rotating log file
    #[arg(long)]
    log_stderr: bool,

    /// Increase verbosity (-v debug, -vv trace). Default is info.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("snowflake-read-mcp"))
    }
}

/// Start logging. Failure is reported on stderr and otherwise ignored.
fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let result = if cli.log_stderr {
        init_tracing(CRATE_NAME, cli.log_level()).map(|_| None)
    } else {
        init_file_tracing(CRATE_NAME, cli.log_level(), &cli.log_dir(), DEFAULT_MAX_LOG_BYTES)
            .map(Some)
    };

    result.unwrap_or_else(|e| {
        eprintln!("snowflake-read-mcp: logging disabled: {:#}", e);
        None
    })
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl-C");
}

/// Serve over stdio until the client disconnects or a shutdown signal arrives
async fn serve(server: SnowflakeReadServer) -> Result<()> {
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP service")?;
    info!("MCP service running on stdio");

    let token = service.cancellation_token();
    let signals = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        token.cancel();
    });

    let waited = service.waiting().await;
    signals.abort();

    let reason = waited.context("MCP service task failed")?;
    info!(?reason, "MCP service stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli);

    let config = match resolve_connection(cli.connection.as_deref(), cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid Snowflake configuration: {}", e);
            eprintln!("snowflake-read-mcp: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let driver = match SnowflakeRestDriver::new() {
        Ok(driver) => driver,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            eprintln!("snowflake-read-mcp: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let gateway = Arc::new(QueryGateway::new(config, Arc::new(driver)));
    if let Err(e) = gateway.test_connection().await {
        error!("Startup connection check failed: {}", e);
        eprintln!("snowflake-read-mcp: {}", e);
        return ExitCode::FAILURE;
    }
    info!("Snowflake connection verified");

    let served = serve(SnowflakeReadServer::new(gateway.clone())).await;
    if let Err(e) = &served {
        error!("MCP transport error: {:#}", e);
    }

    let closed = gateway.shutdown().await;
    if let Err(e) = &closed {
        error!("Failed to close Snowflake connection: {}", e);
    }

    if served.is_ok() && closed.is_ok() {
        info!("Shutdown complete");
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
