//! Handler trait and registry.
//!
//! Routes reference handlers by an opaque string id. The [`HandlerRegistry`]
//! maps those ids to type-erased [`Handler`] implementations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::types::{BoxFuture, Request, Response};

/// The terminal step of a middleware chain.
///
/// # Example
///
/// ```rust
/// use waypoint_core::{Handler, HandlerError, IntoResponse, Request, RequestContext, Response, BoxFuture};
///
/// struct ShowUser;
///
/// impl Handler for ShowUser {
///     fn call<'a>(
///         &'a self,
///         ctx: &'a RequestContext,
///         _request: Request,
///     ) -> BoxFuture<'a, Result<Response, HandlerError>> {
///         Box::pin(async move {
///             let id = ctx.param("id").unwrap_or("unknown");
///             Ok(format!("user {id}").into_response())
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles a request.
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>>;
}

/// A function-based handler.
///
/// See [`handler_fn`].
pub struct FnHandler<F> {
    func: F,
}

/// Wraps a closure as a [`Handler`].
///
/// The closure returns a boxed future so it can borrow the context:
///
/// ```rust
/// use waypoint_core::{handler_fn, IntoResponse};
///
/// let show = handler_fn(|ctx, _req| {
///     Box::pin(async move {
///         Ok(format!("post {}", ctx.param("post").unwrap_or("latest")).into_response())
///     })
/// });
/// # let _ = show;
/// ```
pub fn handler_fn<F>(func: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a RequestContext, Request) -> BoxFuture<'a, Result<Response, HandlerError>>
        + Send
        + Sync
        + 'static,
{
    FnHandler { func }
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a RequestContext, Request) -> BoxFuture<'a, Result<Response, HandlerError>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>> {
        (self.func)(ctx, request)
    }
}

impl<H: Handler> Handler for Arc<H> {
    fn call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>> {
        (**self).call(ctx, request)
    }
}

/// Handlers keyed by the id routes refer to.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `id`, returning the replaced handler if any.
    pub fn register<H: Handler>(
        &mut self,
        id: impl Into<String>,
        handler: H,
    ) -> Option<Arc<dyn Handler>> {
        self.handlers.insert(id.into(), Arc::new(handler))
    }

    /// Returns the handler registered under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(id)
    }

    /// Returns true when `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}
