//! Middleware descriptors and references.

use std::fmt;
use std::sync::Arc;

use crate::error::MiddlewareError;
use crate::middleware::Middleware;

/// How long a middleware instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// A fresh instance per request, shared by `handle` and `terminate`.
    PerRequest,
    /// One instance for the whole process.
    #[default]
    Singleton,
}

type Factory = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

#[derive(Clone)]
enum Source {
    Shared(Arc<dyn Middleware>),
    Factory(Factory),
}

/// How to obtain a middleware instance.
///
/// # Example
///
/// ```rust
/// use waypoint_middleware::{from_fn, Lifetime, MiddlewareDescriptor};
///
/// let trim = MiddlewareDescriptor::singleton(from_fn("trim", |ctx, req, _args, next| {
///     Box::pin(async move { next.run(ctx, req).await })
/// }));
/// assert_eq!(trim.lifetime(), Lifetime::Singleton);
/// ```
#[derive(Clone)]
pub struct MiddlewareDescriptor {
    source: Source,
}

impl MiddlewareDescriptor {
    /// One shared instance.
    pub fn singleton<M: Middleware>(middleware: M) -> Self {
        Self::shared(Arc::new(middleware))
    }

    /// One shared, already boxed instance.
    pub fn shared(middleware: Arc<dyn Middleware>) -> Self {
        Self {
            source: Source::Shared(middleware),
        }
    }

    /// A new instance from `factory` for every request.
    pub fn per_request<F, M>(factory: F) -> Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Middleware,
    {
        Self {
            source: Source::Factory(Arc::new(move || Arc::new(factory()) as Arc<dyn Middleware>)),
        }
    }

    /// The instance lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        match self.source {
            Source::Shared(_) => Lifetime::Singleton,
            Source::Factory(_) => Lifetime::PerRequest,
        }
    }

    /// The instance to use for one request.
    #[must_use]
    pub fn instance(&self) -> Arc<dyn Middleware> {
        match &self.source {
            Source::Shared(middleware) => Arc::clone(middleware),
            Source::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for MiddlewareDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareDescriptor")
            .field("lifetime", &self.lifetime())
            .finish_non_exhaustive()
    }
}

/// A parsed `name` or `name:arg1,arg2` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MiddlewareRef {
    /// Alias or group name.
    pub name: String,
    /// Parameters passed to `handle`.
    pub args: Vec<String>,
}

impl MiddlewareRef {
    /// Parses a reference.
    ///
    /// ```rust
    /// use waypoint_middleware::MiddlewareRef;
    ///
    /// let r = MiddlewareRef::parse("throttle:60,1").unwrap();
    /// assert_eq!(r.name, "throttle");
    /// assert_eq!(r.args, ["60", "1"]);
    /// ```
    pub fn parse(reference: &str) -> Result<Self, MiddlewareError> {
        let (name, args) = match reference.split_once(':') {
            Some((name, args)) => (name.trim(), args),
            None => (reference.trim(), ""),
        };
        if name.is_empty() {
            return Err(MiddlewareError::empty_reference(reference));
        }

        let args = if args.is_empty() {
            Vec::new()
        } else {
            args.split(',').map(|a| a.trim().to_string()).collect()
        };

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }

    /// Whether the reference carries parameters.
    #[must_use]
    pub fn has_args(&self) -> bool {
        !self.args.is_empty()
    }
}

impl fmt::Display for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.name, self.args.join(","))
        }
    }
}
