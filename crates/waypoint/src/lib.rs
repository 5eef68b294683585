//! # Waypoint
//!
//! **HTTP request router with a composable middleware pipeline**
//!
//! Waypoint matches a request to a handler and runs an ordered chain of
//! middleware around it:
//!
//! - **Ordered matching** - first registered route wins; 404 and 405 (with
//!   `Allow`) are rendered for you
//! - **Route groups** - shared prefix, domain, name prefix and middleware
//! - **Middleware aliases and groups** - with parameters (`throttle:60,1`),
//!   global middleware, exclusions and a priority order
//! - **Onion dispatch** - before/after logic, short-circuits, error
//!   propagation through `?`
//! - **Terminate hooks** - run after the response is handed to the client
//! - **Model binding** - route parameters resolved into domain objects
//!
//! The transport owns the socket. It hands the kernel an `http::Request`,
//! sends back the response, then runs the terminator:
//!
//! ```rust
//! use http::Method;
//! use waypoint::{empty_request, from_fn, handler_fn, IntoResponse, Kernel, MiddlewareDescriptor, RouteDefinition};
//!
//! # tokio_test::block_on(async {
//! let kernel = Kernel::builder()
//!     .alias("trim", MiddlewareDescriptor::singleton(from_fn("trim", |ctx, request, _args, next| {
//!         Box::pin(async move { next.run(ctx, request).await })
//!     })))
//!     .register(|routes| {
//!         routes.register(RouteDefinition::get("/posts/{post}", "posts.show").middleware(["trim"]))?;
//!         Ok(())
//!     })
//!     .handler("posts.show", handler_fn(|ctx, _req| {
//!         Box::pin(async move { Ok(format!("post {}", ctx.param("post").unwrap_or("?")).into_response()) })
//!     }))
//!     .build()?;
//!
//! let dispatched = kernel.handle(empty_request(Method::GET, "/posts/hello")).await;
//! assert_eq!(dispatched.response.status(), 200);
//! // ... write dispatched.response to the client ...
//! dispatched.terminator.finish(true).await;
//! # Ok::<(), waypoint::BootError>(())
//! # }).unwrap();
//! ```

#![doc(html_root_url = "https://docs.rs/waypoint/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod builder;
mod error;
mod kernel;

pub use builder::{init_logging, KernelBuilder};
pub use error::BootError;
pub use kernel::{Dispatched, Kernel, Terminator, REQUEST_ID_HEADER};

pub use waypoint_config as config;
pub use waypoint_core as core;
pub use waypoint_middleware as middleware;
pub use waypoint_router as router;
pub use waypoint_telemetry as telemetry;

pub use waypoint_core::{
    empty_request, handler_fn, Handler, HandlerError, HandlerResult, IntoResponse, Json, Redirect,
    Request, RequestContext, RequestId, Response,
};
pub use waypoint_middleware::{
    from_fn, Completion, Middleware, MiddlewareCatalog, MiddlewareDescriptor, MiddlewareRegistry,
    Next, TerminateReport,
};
pub use waypoint_router::{GroupAttributes, MissingModel, RouteDefinition, RouteTable};

/// Prelude module for convenient imports.
///
/// ```rust
/// use waypoint::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        from_fn, handler_fn, BootError, Dispatched, GroupAttributes, Handler, HandlerError,
        HandlerResult, IntoResponse, Json, Kernel, Middleware, MiddlewareDescriptor, MissingModel,
        Next, Redirect, Request, RequestContext, Response, RouteDefinition,
    };
    pub use waypoint_core::binding::resolver_fn;
    pub use waypoint_core::BoxFuture;
}
