// src/logging.rs

//! Logging setup for `borgsnap`.
//!
//! The filter comes from `--log-level` when given, otherwise from
//! `BORGSNAP_LOG`, which accepts full `tracing` directives such as
//! `borgsnap::engine=debug,info`. Without either, `info` is used.
//!
//! Everything goes to stderr: stdout carries only the dry-run command line,
//! and the archive child's own output is forwarded to stderr as well.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "BORGSNAP_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Call once, before the run starts.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env_value.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("initialising logging: {e}"))
}

/// The flag wins over the environment; a malformed `BORGSNAP_LOG` is an
/// error rather than being silently ignored.
fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(directive(level)));
    }
    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => EnvFilter::try_new(raw).with_context(|| format!("invalid {LOG_ENV} value `{raw}`")),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
