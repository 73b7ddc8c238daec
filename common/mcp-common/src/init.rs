//! Logging initialization
//!
//! MCP servers speak their protocol over stdout, so diagnostics must go
//! somewhere else: stderr for servers launched under a supervisor that
//! captures it, or a size-rotated file for clients that merge stderr into
//! the protocol stream or discard it.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::logfile::RotatingFileWriter;

/// Name of the active log file inside the log directory
pub const LOG_FILE_NAME: &str = "app.log";

fn env_filter(crate_name: &str, level: &str) -> anyhow::Result<EnvFilter> {
    let directive = format!("{}={}", crate_name, level);
    Ok(EnvFilter::from_default_env().add_directive(directive.parse()?))
}

fn use_json() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Initialize tracing to stderr
///
/// - Formatted output without ANSI colors
/// - Environment-based filtering via RUST_LOG
/// - `level` applied to the given crate by default
///
/// Set `LOG_FORMAT=json` for structured JSON output.
///
/// # Example
///
/// ```rust,ignore
/// mcp_common::init_tracing("snowflake_read_mcp", "info")?;
/// ```
pub fn init_tracing(crate_name: &str, level: &str) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(crate_name, level)?);

    if use_json() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

/// Initialize tracing to a size-rotated file in `log_dir`
///
/// Writes `app.log`, moving it to `app.log.old` once it grows past
/// `max_bytes`. Writing happens on a background thread; keep the returned
/// guard alive until shutdown so buffered lines are flushed.
///
/// # Example
///
/// ```rust,ignore
/// let _guard = mcp_common::init_file_tracing(
///     "snowflake_read_mcp",
///     "info",
///     &std::env::temp_dir().join("snowflake-read-mcp"),
///     mcp_common::logfile::DEFAULT_MAX_LOG_BYTES,
/// )?;
/// ```
pub fn init_file_tracing(
    crate_name: &str,
    level: &str,
    log_dir: &Path,
    max_bytes: u64,
) -> anyhow::Result<WorkerGuard> {
    let writer = RotatingFileWriter::new(log_dir, LOG_FILE_NAME, max_bytes);
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);

    let registry = tracing_subscriber::registry().with(env_filter(crate_name, level)?);

    if use_json() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(guard)
}
