//! Observability for Waypoint.
//!
//! - **Logging**: structured `tracing` output, JSON or human-readable
//! - **Metrics**: request counters and histograms through the `metrics` facade
//!
//! No exporter is installed here. Applications that want Prometheus or
//! StatsD output install a `metrics` recorder of their choice; until then
//! every recording call is a no-op.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `waypoint_requests_total` | Counter | `route`, `status` | Dispatched requests |
//! | `waypoint_request_duration_seconds` | Histogram | `route` | Inbound phase latency |
//! | `waypoint_route_misses_total` | Counter | `kind` | 404 and 405 outcomes |
//! | `waypoint_terminate_failures_total` | Counter | `middleware` | Failed terminate hooks |
//!
//! # Example
//!
//! ```rust,no_run
//! use waypoint_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development()).expect("logging");
//! waypoint_telemetry::metrics::describe_metrics();
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
