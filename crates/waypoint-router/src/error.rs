//! Router error types.
//!
//! Three families of failure come out of this crate:
//!
//! - [`RouteError`] - configuration mistakes detected while routes are
//!   registered. These are fatal and surface at startup.
//! - [`MatchError`] - the expected per-request outcomes when no route
//!   accepts a request (404 / 405).
//! - [`UnresolvedRoute`] - reverse lookup (`url_for`) failures.

use http::{Method, StatusCode};
use thiserror::Error;

/// A route table configuration error.
///
/// Every variant is raised during registration, never while matching.
#[derive(Error, Debug)]
pub enum RouteError {
    /// A route name was registered twice.
    #[error("duplicate route name: {name}")]
    DuplicateName {
        /// The name that is already taken.
        name: String,
    },

    /// An optional parameter is followed by a required segment.
    #[error("optional parameter '{param}' must be trailing in pattern {pattern}")]
    OptionalNotTrailing {
        /// The offending pattern.
        pattern: String,
        /// The optional parameter.
        param: String,
    },

    /// A model binding targets an optional parameter that has no default.
    #[error("bound optional parameter '{param}' in pattern {pattern} needs a default")]
    MissingDefault {
        /// The offending pattern.
        pattern: String,
        /// The optional parameter.
        param: String,
    },

    /// A default value that the parameter's own constraint rejects.
    #[error("default '{value}' for parameter '{param}' in {pattern} fails its constraint")]
    DefaultViolatesConstraint {
        /// The offending pattern.
        pattern: String,
        /// The constrained parameter.
        param: String,
        /// The rejected default.
        value: String,
    },

    /// The same parameter name appears twice in one route.
    #[error("parameter '{param}' is declared twice in {pattern}")]
    DuplicateParam {
        /// The offending pattern.
        pattern: String,
        /// The repeated parameter.
        param: String,
    },

    /// A segment mixes braces with literal text or has an invalid name.
    #[error("invalid segment '{segment}' in pattern {pattern}")]
    InvalidSegment {
        /// The offending pattern.
        pattern: String,
        /// The segment that failed to parse.
        segment: String,
    },

    /// A parameter constraint is not a valid regular expression.
    #[error("invalid constraint for parameter '{param}': {source}")]
    InvalidConstraint {
        /// The constrained parameter.
        param: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// A constraint, default or binding names a parameter the route does not declare.
    #[error("{rule} targets unknown parameter '{param}' in {pattern}")]
    UnknownParam {
        /// The offending pattern.
        pattern: String,
        /// The parameter name that was not found.
        param: String,
        /// Which rule referenced it (`constraint`, `default` or `binding`).
        rule: &'static str,
    },

    /// A route was registered with no HTTP methods.
    #[error("route {pattern} has an empty method set")]
    EmptyMethods {
        /// The offending pattern.
        pattern: String,
    },

    /// Domain patterns cannot contain optional parameters.
    #[error("optional parameter '{param}' is not allowed in domain {domain}")]
    OptionalInDomain {
        /// The domain pattern.
        domain: String,
        /// The optional parameter.
        param: String,
    },
}

impl RouteError {
    /// Creates a duplicate name error.
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    pub(crate) fn invalid_segment(pattern: &str, segment: &str) -> Self {
        Self::InvalidSegment {
            pattern: pattern.to_string(),
            segment: segment.to_string(),
        }
    }

    pub(crate) fn unknown_param(pattern: &str, param: &str, rule: &'static str) -> Self {
        Self::UnknownParam {
            pattern: pattern.to_string(),
            param: param.to_string(),
            rule,
        }
    }
}

/// Outcome of a lookup that did not produce a route.
///
/// Neither variant is a fault; the transport boundary renders them as
/// status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// No route matches the path and host.
    #[error("no route for {method} {path}")]
    NotFound {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
    },

    /// A route matches the path and host but not the method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
        /// Methods that would have matched, in registration order.
        allowed: Vec<Method>,
    },
}

impl MatchError {
    /// Returns the HTTP status for this outcome.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Returns the allowed methods for a 405 outcome.
    #[must_use]
    pub fn allowed(&self) -> &[Method] {
        match self {
            Self::NotFound { .. } => &[],
            Self::MethodNotAllowed { allowed, .. } => allowed,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
        }
    }
}

/// A named route could not be turned into a URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedRoute {
    /// No route carries this name.
    #[error("unresolved route: no route named '{name}'")]
    UnknownName {
        /// The requested name.
        name: String,
    },

    /// A required parameter was not supplied.
    #[error("unresolved route '{name}': missing required parameter '{param}'")]
    MissingParameter {
        /// The route name.
        name: String,
        /// The missing parameter.
        param: String,
    },

    /// A supplied value does not satisfy the parameter's constraint.
    #[error("unresolved route '{name}': value '{value}' violates constraint on '{param}'")]
    ConstraintViolation {
        /// The route name.
        name: String,
        /// The constrained parameter.
        param: String,
        /// The rejected value.
        value: String,
    },
}
