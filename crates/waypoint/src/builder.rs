//! Kernel assembly and startup validation.

use std::time::Duration;

use waypoint_config::WaypointConfig;
use waypoint_core::binding::ModelResolver;
use waypoint_core::{BindingRegistry, Handler, HandlerRegistry};
use waypoint_middleware::{MiddlewareCatalog, MiddlewareDescriptor, MiddlewareRegistry};
use waypoint_router::{MissingModel, RouteError, RouteTable};

use crate::error::BootError;
use crate::kernel::{Kernel, KernelInner};

/// Collects routes, middleware, handlers and resolvers, then validates
/// them all at once in [`build`](Self::build).
///
/// Route registration errors are kept until `build`, so registration can
/// be chained.
///
/// # Example
///
/// ```rust
/// use waypoint::{handler_fn, IntoResponse, Kernel, RouteDefinition};
///
/// let result = Kernel::builder()
///     .register(|routes| {
///         routes.register(RouteDefinition::get("/", "home").middleware(["auth"]))?;
///         Ok(())
///     })
///     .handler("home", handler_fn(|_ctx, _req| Box::pin(async { Ok("home".into_response()) })))
///     .build();
///
/// // "auth" was never registered as an alias or group.
/// assert!(result.is_err());
/// ```
#[derive(Default)]
pub struct KernelBuilder {
    routes: RouteTable,
    route_error: Option<RouteError>,
    middleware: MiddlewareRegistry,
    catalog: MiddlewareCatalog,
    handlers: HandlerRegistry,
    bindings: BindingRegistry,
    config: Option<WaypointConfig>,
    request_timeout: Option<Duration>,
    spawn_terminate: bool,
    trust_request_id: bool,
}

impl KernelBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            spawn_terminate: true,
            ..Self::default()
        }
    }

    /// Replaces the route table.
    #[must_use]
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Registers routes; the first error is reported by `build`.
    #[must_use]
    pub fn register<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&mut RouteTable) -> Result<(), RouteError>,
    {
        if self.route_error.is_none() {
            if let Err(err) = register(&mut self.routes) {
                self.route_error = Some(err);
            }
        }
        self
    }

    /// Replaces the middleware registry.
    #[must_use]
    pub fn middleware(mut self, registry: MiddlewareRegistry) -> Self {
        self.middleware = registry;
        self
    }

    /// Registers a middleware alias.
    #[must_use]
    pub fn alias(mut self, name: impl Into<String>, descriptor: MiddlewareDescriptor) -> Self {
        self.middleware.alias(name, descriptor);
        self
    }

    /// Registers a middleware group.
    #[must_use]
    pub fn group<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.group(name, members);
        self
    }

    /// Middleware the `[middleware.aliases]` config section may refer to.
    #[must_use]
    pub fn catalog(mut self, catalog: MiddlewareCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Registers a handler under the id routes refer to.
    #[must_use]
    pub fn handler<H: Handler>(mut self, id: impl Into<String>, handler: H) -> Self {
        self.handlers.register(id, handler);
        self
    }

    /// Registers a model resolver under a binding tag.
    #[must_use]
    pub fn resolver<R: ModelResolver>(mut self, tag: impl Into<String>, resolver: R) -> Self {
        self.bindings.register(tag, resolver);
        self
    }

    /// Applies a loaded configuration.
    ///
    /// The middleware section is merged into the registry through the
    /// catalog, and the dispatch section sets the request deadline and how
    /// terminate hooks are scheduled.
    #[must_use]
    pub fn config(mut self, config: WaypointConfig) -> Self {
        self.request_timeout = config.dispatch.request_timeout_ms.map(Duration::from_millis);
        self.spawn_terminate = config.dispatch.spawn_terminate;
        self.config = Some(config);
        self
    }

    /// Sets the request deadline, overriding the configuration.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reuse a valid incoming `x-request-id` instead of generating one.
    #[must_use]
    pub fn trust_request_id(mut self, trust: bool) -> Self {
        self.trust_request_id = trust;
        self
    }

    /// Validates everything and resolves each route's middleware chain.
    ///
    /// # Errors
    ///
    /// Returns the first [`BootError`] found: a failed route registration,
    /// an invalid configuration, an inconsistent middleware registry, an
    /// unresolvable route chain, or a route naming an unknown handler or
    /// binding tag.
    pub fn build(mut self) -> Result<Kernel, BootError> {
        if let Some(err) = self.route_error {
            return Err(err.into());
        }

        if let Some(config) = &self.config {
            config.validate()?;
            self.middleware
                .apply_config(&config.middleware, &self.catalog)?;
        }
        self.middleware.validate()?;

        let mut chains = Vec::with_capacity(self.routes.len());
        for route in self.routes.routes() {
            if !self.handlers.contains(route.handler()) {
                return Err(BootError::unknown_handler(route, route.handler()));
            }
            if let MissingModel::Handler(fallback) = route.missing() {
                if !self.handlers.contains(fallback) {
                    return Err(BootError::unknown_handler(route, fallback.as_str()));
                }
            }
            if let Some(binding) = route
                .bindings()
                .iter()
                .find(|binding| !self.bindings.contains(&binding.tag))
            {
                return Err(BootError::unknown_binding_tag(route, binding.tag.as_str()));
            }

            let chain = self
                .middleware
                .resolve_route(route)
                .map_err(|source| BootError::RouteChain {
                    route: route.to_string(),
                    source,
                })?;
            chains.push(chain);
        }

        waypoint_telemetry::metrics::describe_metrics();
        tracing::info!(
            routes = self.routes.len(),
            aliases = self.middleware.alias_count(),
            groups = self.middleware.group_count(),
            handlers = self.handlers.len(),
            "kernel built"
        );

        Ok(Kernel::from_inner(KernelInner {
            routes: self.routes,
            chains,
            handlers: self.handlers,
            bindings: self.bindings,
            request_timeout: self.request_timeout,
            spawn_terminate: self.spawn_terminate,
            trust_request_id: self.trust_request_id,
        }))
    }
}

impl std::fmt::Debug for KernelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelBuilder")
            .field("routes", &self.routes.len())
            .field("handlers", &self.handlers)
            .field("bindings", &self.bindings)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Installs the global `tracing` subscriber described by the logging
/// section of `config`.
///
/// # Errors
///
/// Fails when the level is invalid or a subscriber is already installed.
pub fn init_logging(config: &WaypointConfig) -> Result<(), BootError> {
    waypoint_telemetry::init_logging(&config.logging.to_log_config())?;
    Ok(())
}
