//! Typed configuration for Waypoint.
//!
//! - TOML and JSON configuration files
//! - `.env` files via `dotenvy`
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! The root type is [`WaypointConfig`]:
//!
//! - [`LoggingSection`] - log level and output format
//! - [`DispatchConfig`] - request deadline and terminate hook scheduling
//! - [`MiddlewareConfig`] - aliases, groups, global list and priority
//!
//! # Example
//!
//! ```no_run
//! use waypoint_config::ConfigLoader;
//!
//! # fn main() -> Result<(), waypoint_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("waypoint.toml")?
//!     .with_env_prefix("WAYPOINT")
//!     .load()?;
//!
//! println!("{} middleware groups", config.middleware.groups.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [dispatch]
//! request_timeout_ms = 30000
//! spawn_terminate = true
//!
//! [middleware]
//! global = ["trim"]
//! priority = ["session", "auth"]
//!
//! [middleware.aliases]
//! auth = "authenticate"
//!
//! [middleware.groups]
//! web = ["session", "csrf"]
//! api = ["throttle:60,1", "auth"]
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values are overridden with `PREFIX__SECTION__KEY` variables:
//!
//! - `WAYPOINT__LOGGING__LEVEL=debug`
//! - `WAYPOINT__DISPATCH__REQUEST_TIMEOUT_MS=none`
//! - `WAYPOINT__MIDDLEWARE__GLOBAL="trim throttle:60,1"` (whitespace separated)
//! - `WAYPOINT__MIDDLEWARE__ALIASES__AUTH=authenticate`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{WaypointConfig, WaypointConfigBuilder};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{DispatchConfig, LoggingSection, MiddlewareConfig};
pub use waypoint_telemetry::LogFormat;
