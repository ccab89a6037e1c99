//! Structured logging for dbq-inspect
//!
//! Reports go to stdout, so console logs are written to stderr.

use thiserror::Error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for log shipping
    Json,
    /// Single-line format
    Compact,
}

impl LogFormat {
    /// Parse from environment variable
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") => LogFormat::Pretty,
            Ok("compact") | Ok(_) => LogFormat::Compact,
            Err(_) => LogFormat::Compact,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr only
    Console,
    /// Log to file only
    File,
    /// Log to both stderr and file
    Both,
}

impl LogOutput {
    /// Parse from environment variable; `stdout` is accepted as a console alias
    pub fn from_env() -> Self {
        match std::env::var("LOG_OUTPUT").as_deref() {
            Ok("file") => LogOutput::File,
            Ok("both") => LogOutput::Both,
            Ok(_) => LogOutput::Console,
            Err(_) => LogOutput::Console,
        }
    }
}

/// Initialize logging from the environment
///
/// Environment variables:
/// - `RUST_LOG`: Log level (e.g., "debug", "dbq_engine=trace")
/// - `LOG_FORMAT`: Output format ("pretty", "json", "compact")
/// - `LOG_OUTPUT`: Where to write logs ("console", "file", "both")
/// - `LOG_DIR`: Directory for log files (default: "./logs")
///
/// ```bash
/// RUST_LOG=dbq_engine=debug LOG_FORMAT=json LOG_OUTPUT=both dbq-inspect run spec.json
/// ```
pub fn init() -> Result<(), LoggingError> {
    let format = LogFormat::from_env();
    let output = LogOutput::from_env();

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;

    let console_layer = match output {
        LogOutput::File => None,
        LogOutput::Console | LogOutput::Both => Some(match format {
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr)
                .boxed(),
            LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
        }),
    };

    let file_layer = match output {
        LogOutput::Console => None,
        LogOutput::File | LogOutput::Both => {
            let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
            std::fs::create_dir_all(&log_dir).ok();
            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, &log_dir, "dbq-inspect.log");

            let layer = match format {
                LogFormat::Json => fmt::layer().json().with_writer(file_appender).boxed(),
                LogFormat::Pretty | LogFormat::Compact => {
                    fmt::layer().with_writer(file_appender).with_ansi(false).boxed()
                }
            };
            Some(layer)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(format = ?format, output = ?output, "Logging initialized");
    Ok(())
}
