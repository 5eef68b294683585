//! Configuration error types.
//!
//! Parse failures carry an `origin`: the file path, or `inline` for content
//! handed to [`ConfigLoader::with_string`](crate::ConfigLoader::with_string).

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `with_file` was given a path that does not exist.
    #[error("config file {} does not exist", .path.display())]
    FileNotFound {
        /// The requested path.
        path: PathBuf,
    },

    /// The file exists but reading it failed.
    #[error("cannot read config file {}", .path.display())]
    Unreadable {
        /// The file.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax error or unknown field.
    #[error("{origin}: {source}")]
    Toml {
        /// File path or `inline`.
        origin: String,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },

    /// JSON syntax error or unknown field.
    #[error("{origin}: {source}")]
    Json {
        /// File path or `inline`.
        origin: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// Neither `toml` nor `json`.
    #[error("{origin}: unsupported format '{format}', expected toml or json")]
    UnsupportedFormat {
        /// File path or `inline`.
        origin: String,
        /// The rejected extension or format name.
        format: String,
    },

    /// A loaded value fails validation.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path of the field, e.g. `middleware.groups.api`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `PREFIX__SECTION__KEY` override has a value of the wrong shape.
    #[error("environment override {var}: {reason}")]
    EnvOverride {
        /// The variable name.
        var: String,
        /// The shape that was expected.
        reason: String,
    },

    /// A `.env` file is malformed, or missing when named explicitly.
    #[error(".env: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

impl ConfigError {
    /// A value rejected by [`WaypointConfig::validate`](crate::WaypointConfig::validate).
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env_override(var: &str, reason: &str) -> Self {
        Self::EnvOverride {
            var: var.to_owned(),
            reason: reason.to_owned(),
        }
    }
}
