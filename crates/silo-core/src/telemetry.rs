//! Logging setup
//!
//! TigerStyle: Explicit telemetry configuration, installed once per process.

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Whether to write log lines to stderr
    pub stderr_enabled: bool,
    /// Log level filter (used when `RUST_LOG` is unset)
    pub log_level: String,
    /// Whether to include the target module in each line
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "silo".to_string(),
            stderr_enabled: true,
            log_level: "info".to_string(),
            with_target: false,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Disable logging to stderr
    pub fn without_stderr(mut self) -> Self {
        self.stderr_enabled = false;
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Include module targets in log lines
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `config.log_level`. Logs go to stderr so
/// stdout stays reserved for command output.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    if !config.stderr_enabled {
        return Ok(TelemetryGuard { installed: false });
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.with_target)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Internal {
            message: format!("failed to initialize tracing subscriber: {}", e),
        })?;

    tracing::info!(service = %config.service_name, "Telemetry initialized");

    Ok(TelemetryGuard { installed: true })
}

/// Guard returned by [`init_telemetry`]
///
/// Hold it for the lifetime of the process.
#[derive(Debug)]
pub struct TelemetryGuard {
    installed: bool,
}

impl TelemetryGuard {
    /// Whether a subscriber was installed
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}
