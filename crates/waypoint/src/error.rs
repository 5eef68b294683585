//! Startup errors.

use thiserror::Error;
use waypoint_config::ConfigError;
use waypoint_middleware::MiddlewareError;
use waypoint_router::RouteError;
use waypoint_telemetry::TelemetryError;

/// A configuration problem detected while building a [`Kernel`](crate::Kernel).
///
/// Every variant is fatal: nothing is served until it is fixed.
#[derive(Error, Debug)]
pub enum BootError {
    /// Route registration failed.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// The middleware registry is inconsistent.
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),

    /// A route's middleware list cannot be resolved.
    #[error("route {route}: {source}")]
    RouteChain {
        /// The route, as `METHODS uri`.
        route: String,
        /// The resolution failure.
        #[source]
        source: MiddlewareError,
    },

    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// A route references a handler id nobody registered.
    #[error("route {route}: unknown handler '{handler}'")]
    UnknownHandler {
        /// The route, as `METHODS uri`.
        route: String,
        /// The missing handler id.
        handler: String,
    },

    /// A route binds a parameter to a tag with no resolver.
    #[error("route {route}: no resolver registered for binding tag '{tag}'")]
    UnknownBindingTag {
        /// The route, as `METHODS uri`.
        route: String,
        /// The missing tag.
        tag: String,
    },
}

impl BootError {
    /// Creates an unknown handler error.
    pub fn unknown_handler(route: impl ToString, handler: impl Into<String>) -> Self {
        Self::UnknownHandler {
            route: route.to_string(),
            handler: handler.into(),
        }
    }

    /// Creates an unknown binding tag error.
    pub fn unknown_binding_tag(route: impl ToString, tag: impl Into<String>) -> Self {
        Self::UnknownBindingTag {
            route: route.to_string(),
            tag: tag.into(),
        }
    }
}
