//! Request context types.
//!
//! The [`RequestContext`] carries per-request state through the middleware
//! chain and into the handler: the request id, the matched route, decoded
//! parameters, bound models and typed extensions.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use waypoint_router::Params;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for one request close
/// together when sorted by id.
///
/// # Example
///
/// ```
/// use waypoint_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a request id forwarded by an upstream proxy.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A model produced by a binding resolver.
pub type BoundModel = Arc<dyn Any + Send + Sync>;

/// Per-request state shared by middleware and the handler.
///
/// # Example
///
/// ```
/// use waypoint_core::RequestContext;
/// use waypoint_router::Params;
///
/// let params: Params = [("id", "42")].into_iter().collect();
/// let mut ctx = RequestContext::new().with_params(params);
///
/// ctx.insert_extension(String::from("alice"));
/// assert_eq!(ctx.param("id"), Some("42"));
/// assert_eq!(ctx.extension::<String>().map(String::as_str), Some("alice"));
/// ```
pub struct RequestContext {
    request_id: RequestId,
    route_name: Option<String>,
    handler: Option<String>,
    params: Params,
    models: HashMap<String, BoundModel>,
    extensions: http::Extensions,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with the given request id.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            route_name: None,
            handler: None,
            params: Params::new(),
            models: HashMap::new(),
            extensions: http::Extensions::new(),
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Name of the matched route, if it has one.
    #[must_use]
    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    /// Sets the matched route's name.
    #[must_use]
    pub fn with_route_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.route_name = name.map(Into::into);
        self
    }

    /// Identifier of the handler that will serve the request.
    #[must_use]
    pub fn handler(&self) -> Option<&str> {
        self.handler.as_deref()
    }

    /// Sets the handler identifier.
    pub fn set_handler(&mut self, handler: impl Into<String>) {
        self.handler = Some(handler.into());
    }

    /// Decoded route parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A single route parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Replaces the route parameters.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// The model bound to `param`, if it has type `T`.
    #[must_use]
    pub fn model<T: Send + Sync + 'static>(&self, param: &str) -> Option<&T> {
        self.models.get(param).and_then(|m| m.downcast_ref::<T>())
    }

    /// The model bound to `param` as a shared handle.
    #[must_use]
    pub fn model_arc<T: Send + Sync + 'static>(&self, param: &str) -> Option<Arc<T>> {
        self.models
            .get(param)
            .and_then(|m| Arc::clone(m).downcast::<T>().ok())
    }

    /// Stores a resolved model.
    pub fn insert_model(&mut self, param: impl Into<String>, model: BoundModel) {
        self.models.insert(param.into(), model);
    }

    /// Returns true if a model is bound to `param`.
    #[must_use]
    pub fn has_model(&self, param: &str) -> bool {
        self.models.contains_key(param)
    }

    /// Returns a typed extension.
    #[must_use]
    pub fn extension<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Inserts a typed extension, returning the previous value.
    pub fn insert_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    /// Removes a typed extension.
    pub fn remove_extension<T: Clone + Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions.remove::<T>()
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("route_name", &self.route_name)
            .field("handler", &self.handler)
            .field("params", &self.params)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
