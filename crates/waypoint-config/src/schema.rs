//! Configuration section types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use waypoint_telemetry::{LogConfig, LogFormat};

/// `[logging]` section.
///
/// # Example
///
/// ```
/// use waypoint_config::{LoggingSection, LogFormat};
///
/// let section = LoggingSection {
///     level: "debug".to_string(),
///     format: LogFormat::Pretty,
///     ..Default::default()
/// };
/// assert_eq!(section.to_log_config().level, "debug");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Whether logging is installed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Default level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`.
    #[serde(default)]
    pub format: LogFormat,

    /// ANSI colors for pretty output.
    #[serde(default)]
    pub ansi_enabled: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
        }
    }
}

impl LoggingSection {
    /// Converts the section into the telemetry crate's [`LogConfig`].
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            ansi_enabled: self.ansi_enabled,
            ..LogConfig::default()
        }
    }
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Upper bound on the inbound phase, in milliseconds. `None` disables
    /// the deadline.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Whether the transport spawns terminate hooks instead of awaiting
    /// them.
    #[serde(default = "default_true")]
    pub spawn_terminate: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            spawn_terminate: true,
        }
    }
}

/// `[middleware]` section.
///
/// Aliases map a short name used in route middleware lists to a key of the
/// application's middleware catalog. Groups map a name to an ordered list
/// of references, each possibly parameterised (`throttle:60,1`).
///
/// ```toml
/// [middleware]
/// global = ["trim"]
/// priority = ["session", "auth"]
///
/// [middleware.aliases]
/// auth = "authenticate"
/// throttle = "rate_limit"
///
/// [middleware.groups]
/// api = ["throttle:60,1", "auth"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// References prepended to every route's chain.
    #[serde(default)]
    pub global: Vec<String>,

    /// Names whose relative order is forced.
    #[serde(default)]
    pub priority: Vec<String>,

    /// Short name to catalog key.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    /// Group name to member references.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
