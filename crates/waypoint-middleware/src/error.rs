//! Middleware configuration and terminate hook errors.

use thiserror::Error;

/// A middleware configuration problem, detected when the kernel is built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    /// A reference names neither an alias nor a group.
    #[error("unknown middleware '{name}'")]
    UnknownReference {
        /// The unresolved name.
        name: String,
    },

    /// Group definitions refer to each other in a loop.
    #[error("middleware group cycle: {}", cycle.join(" -> "))]
    CyclicGroup {
        /// Group names along the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },

    /// A reference with an empty name.
    #[error("empty middleware reference '{reference}'")]
    EmptyReference {
        /// The raw reference text.
        reference: String,
    },

    /// A group reference carries parameters.
    #[error("middleware group '{group}' cannot take parameters")]
    ParameterizedGroup {
        /// The group name.
        group: String,
    },

    /// An alias points at a key missing from the catalog.
    #[error("alias '{alias}' points at unknown catalog entry '{key}'")]
    UnknownCatalogKey {
        /// The configured alias.
        alias: String,
        /// The missing catalog key.
        key: String,
    },

    /// The same name is registered as both an alias and a group.
    #[error("'{name}' is registered as both a middleware alias and a group")]
    AmbiguousName {
        /// The conflicting name.
        name: String,
    },
}

impl MiddlewareError {
    /// Creates an unknown reference error.
    pub fn unknown_reference(name: impl Into<String>) -> Self {
        Self::UnknownReference { name: name.into() }
    }

    /// Creates an empty reference error.
    pub fn empty_reference(reference: impl Into<String>) -> Self {
        Self::EmptyReference {
            reference: reference.into(),
        }
    }

    /// Creates a parameterised group error.
    pub fn parameterized_group(group: impl Into<String>) -> Self {
        Self::ParameterizedGroup {
            group: group.into(),
        }
    }

    /// Creates an unknown catalog key error.
    pub fn unknown_catalog_key(alias: impl Into<String>, key: impl Into<String>) -> Self {
        Self::UnknownCatalogKey {
            alias: alias.into(),
            key: key.into(),
        }
    }
}

/// A terminate hook that did not complete.
#[derive(Debug, Error)]
pub enum TerminateHookError {
    /// The hook returned an error.
    #[error("terminate hook of '{middleware}' failed: {source}")]
    Failed {
        /// Name the middleware was referenced by.
        middleware: String,
        /// The hook's error.
        #[source]
        source: anyhow::Error,
    },

    /// The hook panicked.
    #[error("terminate hook of '{middleware}' panicked: {message}")]
    Panicked {
        /// Name the middleware was referenced by.
        middleware: String,
        /// The panic payload, when it was a string.
        message: String,
    },
}

impl TerminateHookError {
    /// Name of the middleware whose hook failed.
    #[must_use]
    pub fn middleware(&self) -> &str {
        match self {
            Self::Failed { middleware, .. } | Self::Panicked { middleware, .. } => middleware,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = MiddlewareError::CyclicGroup {
            cycle: vec!["web".into(), "api".into(), "web".into()],
        };
        assert_eq!(err.to_string(), "middleware group cycle: web -> api -> web");
    }

    #[test]
    fn test_catalog_key_display() {
        let err = MiddlewareError::unknown_catalog_key("auth", "authenticate");
        assert_eq!(
            err.to_string(),
            "alias 'auth' points at unknown catalog entry 'authenticate'"
        );
    }

    #[test]
    fn test_terminate_error_middleware() {
        let err = TerminateHookError::Failed {
            middleware: "audit".into(),
            source: anyhow::anyhow!("disk full"),
        };
        assert_eq!(err.middleware(), "audit");
        assert_eq!(err.to_string(), "terminate hook of 'audit' failed: disk full");
    }
}
