//! Logging setup for the bridge process.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose diagnostics with source locations
    Debug,
    /// One JSON object per line, for log shippers
    Json,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Initialize logging.
///
/// # Environment Variables
///
/// - `BRIDGE_LOG_LEVEL`: overrides every other level setting
/// - `RUST_LOG`: used when `BRIDGE_LOG_LEVEL` is unset
///
/// Otherwise `configured` (the `loglevel` config key) applies, then the mode
/// default.
pub fn init_logging(mode: LoggingMode, configured: Option<&str>) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter(configured, "info")?;
            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter(configured, "debug")?;
            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Json => {
            let filter = create_env_filter(configured, "info")?;
            Registry::default()
                .with(fmt::layer().json().with_current_span(false))
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

fn create_env_filter(configured: Option<&str>, default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = select_directives(
        std::env::var("BRIDGE_LOG_LEVEL").ok(),
        std::env::var("RUST_LOG").ok(),
        configured,
        default_level,
    );
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives,
        reason: e.to_string(),
    })
}

fn select_directives(
    bridge_level: Option<String>,
    rust_log: Option<String>,
    configured: Option<&str>,
    default_level: &str,
) -> String {
    bridge_level
        .or(rust_log)
        .or_else(|| configured.map(str::to_string))
        .filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| default_level.to_string())
}
