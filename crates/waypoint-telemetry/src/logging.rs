//! Structured logging for Waypoint.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either
//! JSON or human-readable output. `RUST_LOG` takes precedence over the
//! configured level when it is set.
//!
//! # Example
//!
//! ```rust,no_run
//! use waypoint_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(route = "users.show", "route matched");
//! # Ok::<(), waypoint_telemetry::TelemetryError>(())
//! ```

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-field lines.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Default level ("trace", "debug", "info", "warn", "error", "off").
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Whether pretty output uses ANSI colors.
    pub ansi_enabled: bool,

    /// Whether to include the target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            ansi_enabled: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Human-readable debug output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            ansi_enabled: true,
            ..Self::default()
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

/// Parses a bare level name.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for anything `LevelFilter` does
/// not accept.
pub fn parse_level(level: &str) -> TelemetryResult<LevelFilter> {
    level
        .parse::<LevelFilter>()
        .map_err(|e| TelemetryError::invalid_filter(level, e))
}

/// Builds the subscriber described by `config`, writing to `writer`.
///
/// [`init_logging`] installs this with stdout; tests pass an in-memory
/// writer.
pub fn build_subscriber<W>(
    config: &LogConfig,
    writer: W,
) -> TelemetryResult<Box<dyn Subscriber + Send + Sync>>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = parse_level(&config.level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(config.include_target)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_ansi(config.ansi_enabled)
            .with_target(config.include_target)
            .with_writer(writer)
            .boxed(),
    };

    Ok(Box::new(
        tracing_subscriber::registry().with(layer.with_filter(filter)),
    ))
}

/// Installs the global subscriber.
///
/// Does nothing when logging is disabled.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if a global subscriber is already
/// set, or `InvalidFilter` if the level does not parse.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let subscriber = build_subscriber(config, std::io::stdout)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Field names used across Waypoint's log events.
pub mod fields {
    /// Request ID.
    pub const REQUEST_ID: &str = "request_id";

    /// Matched route name.
    pub const ROUTE: &str = "route";

    /// Handler identifier.
    pub const HANDLER: &str = "handler";

    /// Middleware name.
    pub const MIDDLEWARE: &str = "middleware";

    /// HTTP method.
    pub const HTTP_METHOD: &str = "method";

    /// Request path.
    pub const HTTP_PATH: &str = "path";

    /// Response status code.
    pub const HTTP_STATUS: &str = "status";

    /// Duration in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Error message.
    pub const ERROR: &str = "error";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.ansi_enabled);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warn").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("OFF").unwrap(), LevelFilter::OFF);
        assert!(matches!(
            parse_level("loud"),
            Err(TelemetryError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let format: LogFormat = serde_json::from_str("\"pretty\"").unwrap();
        assert_eq!(format, LogFormat::Pretty);
    }

    #[test]
    fn test_json_output_carries_fields() {
        let captured = Captured::default();
        let writer = captured.clone();
        let config = LogConfig {
            level: "debug".to_string(),
            ..LogConfig::default()
        };
        let subscriber = build_subscriber(&config, move || writer.clone()).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(request_id = "req-1", route = "users.show", "route matched");
        });

        let output = captured.contents();
        let line: serde_json::Value = serde_json::from_str(output.lines().next().unwrap()).unwrap();
        assert_eq!(line["fields"][fields::REQUEST_ID], "req-1");
        assert_eq!(line["fields"][fields::ROUTE], "users.show");
        assert_eq!(line["fields"]["message"], "route matched");
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
