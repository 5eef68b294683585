//! Core middleware trait and the continuation passed through the chain.
//!
//! A chain runs as an onion: the first entry wraps the second, which wraps
//! the third, down to the endpoint (model binding plus the route handler).
//! Each middleware gets a single-use [`Next`]. Calling it runs everything
//! further inward and yields the downstream result; not calling it
//! short-circuits the chain.
//!
//! # Example
//!
//! ```rust
//! use waypoint_core::{BoxFuture, HandlerResult, Request, RequestContext, Response};
//! use waypoint_middleware::{Middleware, Next};
//!
//! struct ServerHeader;
//!
//! impl Middleware for ServerHeader {
//!     fn name(&self) -> &'static str {
//!         "server-header"
//!     }
//!
//!     fn handle<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         _args: &'a [String],
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, HandlerResult<Response>> {
//!         Box::pin(async move {
//!             let mut response = next.run(ctx, request).await?;
//!             response
//!                 .headers_mut()
//!                 .insert("server", http::HeaderValue::from_static("waypoint"));
//!             Ok(response)
//!         })
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use waypoint_core::{BoxFuture, Handler, HandlerResult, Request, RequestContext, Response};

use crate::chain::ChainEntry;
use crate::terminate::Completion;

/// A before/after interceptor around the route handler.
///
/// # Invariants
///
/// - `next.run()` is called at most once; not calling it short-circuits
/// - Errors from `next.run()` propagate outward unless the middleware
///   matches on them
/// - `terminate` only runs for instances whose `handle` was entered and
///   which report [`terminable`](Self::terminable)
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Inbound step.
    ///
    /// `args` are the reference's parameters: `throttle:60,1` yields
    /// `["60", "1"]`.
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        args: &'a [String],
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>>;

    /// Whether [`terminate`](Self::terminate) should run after the response.
    fn terminable(&self) -> bool {
        false
    }

    /// Post-response hook. Sees a snapshot of the response head only.
    fn terminate<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _completion: &'a Completion,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// The innermost step of a chain.
///
/// The kernel builds one per request around model binding and the route
/// handler; tests build them from closures.
pub struct Endpoint {
    inner: Box<
        dyn for<'c> FnOnce(&'c mut RequestContext, Request) -> BoxFuture<'c, HandlerResult<Response>>
            + Send,
    >,
}

impl Endpoint {
    /// Wraps a closure.
    pub fn new<F>(func: F) -> Self
    where
        F: for<'c> FnOnce(&'c mut RequestContext, Request) -> BoxFuture<'c, HandlerResult<Response>>
            + Send
            + 'static,
    {
        Self {
            inner: Box::new(func),
        }
    }

    /// Calls `handler` directly.
    pub fn handler(handler: Arc<dyn Handler>) -> Self {
        Self::new(move |ctx, request| {
            Box::pin(async move { handler.call(&*ctx, request).await })
        })
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").finish_non_exhaustive()
    }
}

/// Continuation to the rest of the chain.
///
/// Consumed by [`run`](Self::run), so it can be invoked only once.
pub struct Next<'a> {
    entries: &'a [ChainEntry],
    endpoint: Endpoint,
    entered: &'a AtomicUsize,
}

impl<'a> Next<'a> {
    pub(crate) fn new(entries: &'a [ChainEntry], endpoint: Endpoint, entered: &'a AtomicUsize) -> Self {
        Self {
            entries,
            endpoint,
            entered,
        }
    }

    /// Number of middleware still ahead of the endpoint.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Runs the next middleware, or the endpoint when none are left.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> HandlerResult<Response> {
        match self.entries.split_first() {
            Some((entry, rest)) => {
                self.entered.fetch_add(1, Ordering::SeqCst);
                tracing::trace!(middleware = %entry.name(), "entering middleware");
                let next = Next::new(rest, self.endpoint, self.entered);
                entry
                    .middleware()
                    .handle(ctx, request, entry.args(), next)
                    .await
            }
            None => (self.endpoint.inner)(ctx, request).await,
        }
    }
}

/// A middleware built from a closure.
///
/// See [`from_fn`].
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

/// Wraps a closure as a [`Middleware`].
///
/// ```rust
/// use waypoint_middleware::from_fn;
///
/// let timing = from_fn("timing", |ctx, request, _args, next| {
///     Box::pin(async move {
///         let started = std::time::Instant::now();
///         let result = next.run(ctx, request).await;
///         tracing::debug!(elapsed = ?started.elapsed(), "request finished");
///         result
///     })
/// });
/// # let _ = timing;
/// ```
pub fn from_fn<F>(name: &'static str, func: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(
            &'a mut RequestContext,
            Request,
            &'a [String],
            Next<'a>,
        ) -> BoxFuture<'a, HandlerResult<Response>>
        + Send
        + Sync
        + 'static,
{
    FnMiddleware { name, func }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(
            &'a mut RequestContext,
            Request,
            &'a [String],
            Next<'a>,
        ) -> BoxFuture<'a, HandlerResult<Response>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        args: &'a [String],
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>> {
        (self.func)(ctx, request, args, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use waypoint_core::{empty_request, handler_fn, HandlerError, IntoResponse};

    fn ok_endpoint() -> Endpoint {
        Endpoint::new(|_ctx, _req| Box::pin(async { Ok("handled".into_response()) }))
    }

    #[tokio::test]
    async fn test_next_without_entries_runs_endpoint() {
        let entered = AtomicUsize::new(0);
        let next = Next::new(&[], ok_endpoint(), &entered);
        assert_eq!(next.remaining(), 0);

        let mut ctx = RequestContext::new();
        let response = next
            .run(&mut ctx, empty_request(Method::GET, "/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(entered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_endpoint_handler() {
        let handler: Arc<dyn Handler> = Arc::new(handler_fn(|ctx, _req| {
            Box::pin(async move { Err(HandlerError::not_found(format!("{:?}", ctx.param("id")))) })
        }));
        let entered = AtomicUsize::new(0);
        let next = Next::new(&[], Endpoint::handler(handler), &entered);

        let mut ctx = RequestContext::new();
        let err = next
            .run(&mut ctx, empty_request(Method::GET, "/"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_fn_middleware_defaults() {
        let mw = from_fn("noop", |ctx, request, _args, next| {
            Box::pin(async move { next.run(ctx, request).await })
        });
        assert_eq!(mw.name(), "noop");
        assert!(!mw.terminable());
    }
}
