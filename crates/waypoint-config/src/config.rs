//! Top-level configuration.
//!
//! This module provides the [`WaypointConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DispatchConfig, LogFormat, LoggingSection, MiddlewareConfig};

/// Complete Waypoint configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use waypoint_config::WaypointConfig;
///
/// let config = WaypointConfig::default();
/// assert!(config.dispatch.spawn_terminate);
/// assert!(config.middleware.global.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WaypointConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Dispatch behavior.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Middleware aliases, groups, global list and priority.
    #[serde(default)]
    pub middleware: MiddlewareConfig,
}

impl WaypointConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use waypoint_config::{DispatchConfig, WaypointConfig};
    ///
    /// let config = WaypointConfig::builder()
    ///     .dispatch(DispatchConfig {
    ///         request_timeout_ms: Some(5_000),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.dispatch.request_timeout_ms, Some(5_000));
    /// ```
    #[must_use]
    pub fn builder() -> WaypointConfigBuilder {
        WaypointConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - the logging level does not parse
    /// - the request timeout is zero
    /// - an alias, alias target, group name or middleware reference is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        waypoint_telemetry::logging::parse_level(&self.logging.level)
            .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;

        if self.dispatch.request_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "dispatch.request_timeout_ms",
                "must be non-zero when set",
            ));
        }

        let middleware = &self.middleware;
        for (alias, target) in &middleware.aliases {
            if alias.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "middleware.aliases",
                    "alias names must be non-empty",
                ));
            }
            if target.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("middleware.aliases.{alias}"),
                    "catalog key must be non-empty",
                ));
            }
        }

        for (group, members) in &middleware.groups {
            if group.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "middleware.groups",
                    "group names must be non-empty",
                ));
            }
            check_references(&format!("middleware.groups.{group}"), members)?;
        }

        check_references("middleware.global", &middleware.global)?;
        check_references("middleware.priority", &middleware.priority)?;

        Ok(())
    }

    /// Pretty debug logging with colors.
    ///
    /// ```
    /// use waypoint_config::WaypointConfig;
    ///
    /// let config = WaypointConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.ansi_enabled = true;
        config
    }

    /// JSON logging at `info` with a 30 second request deadline.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.ansi_enabled = false;
        config.dispatch.request_timeout_ms = Some(30_000);
        config
    }
}

fn check_references(field: &str, references: &[String]) -> Result<(), ConfigError> {
    if references.iter().any(|r| r.trim().is_empty()) {
        return Err(ConfigError::invalid_value(
            field,
            "middleware references must be non-empty",
        ));
    }
    Ok(())
}

/// Builder for [`WaypointConfig`].
#[derive(Debug, Default)]
pub struct WaypointConfigBuilder {
    logging: Option<LoggingSection>,
    dispatch: Option<DispatchConfig>,
    middleware: Option<MiddlewareConfig>,
}

impl WaypointConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingSection) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the dispatch section.
    #[must_use]
    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Set the middleware section.
    #[must_use]
    pub fn middleware(mut self, middleware: MiddlewareConfig) -> Self {
        self.middleware = Some(middleware);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> WaypointConfig {
        WaypointConfig {
            logging: self.logging.unwrap_or_default(),
            dispatch: self.dispatch.unwrap_or_default(),
            middleware: self.middleware.unwrap_or_default(),
        }
    }
}
