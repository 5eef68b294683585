//! # Waypoint Middleware
//!
//! Middleware registry, chain resolution and onion dispatch.
//!
//! ```text
//! Request → A.before → B.before → [bind models → handler]
//!                                           ↓
//! Response ← A.after ← B.after ←────────────┘
//!
//! (response sent)  → A.terminate → B.terminate
//! ```
//!
//! ## Building blocks
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Middleware`] | Inbound `handle` plus optional `terminate` hook |
//! | [`MiddlewareDescriptor`] | Singleton or per-request instance source |
//! | [`MiddlewareRegistry`] | Aliases, groups, global list, priority |
//! | [`ResolvedChain`] | A route's middleware, computed once at boot |
//! | [`Dispatch`] | Runs one request's [`Chain`] and tracks entered middleware |
//! | [`TerminateHooks`] | Post-response hooks with failure isolation |
//!
//! ## Example
//!
//! ```
//! use http::Method;
//! use waypoint_core::{empty_request, IntoResponse, RequestContext};
//! use waypoint_middleware::{from_fn, Dispatch, Endpoint, MiddlewareDescriptor, MiddlewareRegistry};
//!
//! let mut registry = MiddlewareRegistry::new();
//! registry.alias(
//!     "deny",
//!     MiddlewareDescriptor::singleton(from_fn("deny", |_ctx, _req, _args, _next| {
//!         Box::pin(async { Ok(http::StatusCode::FORBIDDEN.into_response()) })
//!     })),
//! );
//! let chain = registry.resolve(&["deny"], &[] as &[&str]).unwrap();
//!
//! # tokio_test::block_on(async {
//! let dispatch = Dispatch::new(chain.instantiate());
//! let endpoint = Endpoint::new(|_ctx, _req| Box::pin(async { Ok("unreachable".into_response()) }));
//! let mut ctx = RequestContext::new();
//!
//! let response = dispatch
//!     .run(&mut ctx, empty_request(Method::GET, "/"), endpoint)
//!     .await
//!     .unwrap();
//! assert_eq!(response.status(), 403);
//! assert_eq!(dispatch.entered(), 1);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/waypoint-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod chain;
mod descriptor;
mod dispatch;
mod error;
mod middleware;
mod registry;
mod terminate;

pub use chain::{Chain, ChainEntry, ResolvedChain, ResolvedEntry};
pub use descriptor::{Lifetime, MiddlewareDescriptor, MiddlewareRef};
pub use dispatch::Dispatch;
pub use error::{MiddlewareError, TerminateHookError};
pub use middleware::{from_fn, Endpoint, FnMiddleware, Middleware, Next};
pub use registry::{MiddlewareCatalog, MiddlewareRegistry};
pub use terminate::{Completion, RequestHead, TerminateHooks, TerminateReport};
