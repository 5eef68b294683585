//! # Waypoint Core
//!
//! Core types and traits shared by the router, the middleware pipeline and
//! the kernel:
//!
//! - [`RequestContext`] - per-request state (request id, params, models, extensions)
//! - [`RequestId`] - UUID v7 request identifier
//! - [`HandlerError`] - failure type of handlers and middleware
//! - [`Handler`] - terminal request handler trait
//! - [`IntoResponse`] - value to response conversion
//! - [`binding`] - route model binding

#![doc(html_root_url = "https://docs.rs/waypoint-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod binding;
mod context;
mod error;
mod handler;
mod response;
mod types;

pub use binding::{BindOutcome, BindingRegistry, ModelResolver};
pub use context::{BoundModel, RequestContext, RequestId};
pub use error::{ErrorBody, ErrorEnvelope, HandlerError, HandlerResult, MissingBinding};
pub use handler::{handler_fn, FnHandler, Handler, HandlerRegistry};
pub use response::{IntoResponse, Json, Redirect};
pub use types::{empty_request, Body, BoxFuture, Request, Response, ResponseExt};
