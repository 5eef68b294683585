//! The kernel: request lifecycle at the transport boundary.
//!
//! ```text
//! request ─▶ match ─▶ 404/405 ──────────────────────────────┐
//!              │                                             ▼
//!              └─▶ chain ─▶ bind models ─▶ handler ─▶ error boundary ─▶ Dispatched
//!                                                                        │
//!                          transport sends response, then Terminator ◀───┘
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use http::header::{HeaderValue, ALLOW, HOST};
use http::StatusCode;
use tokio::task::JoinHandle;
use tracing::Instrument;
use waypoint_core::{
    BindOutcome, BindingRegistry, HandlerError, HandlerRegistry, HandlerResult, IntoResponse,
    Redirect, Request, RequestContext, RequestId, Response,
};
use waypoint_middleware::{
    Completion, Dispatch, Endpoint, RequestHead, ResolvedChain, TerminateHooks, TerminateReport,
};
use waypoint_router::{MatchError, MissingModel, Route, RouteTable};
use waypoint_telemetry::logging::fields;
use waypoint_telemetry::metrics::{
    record_request, record_route_miss, record_terminate_failure, MissKind, UNNAMED_ROUTE,
};

use crate::builder::KernelBuilder;

/// Header carrying the request id, read from trusted requests and always
/// set on responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub(crate) struct KernelInner {
    pub(crate) routes: RouteTable,
    /// Resolved middleware, indexed by `Route::index`.
    pub(crate) chains: Vec<ResolvedChain>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) bindings: BindingRegistry,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) spawn_terminate: bool,
    pub(crate) trust_request_id: bool,
}

/// Routes requests through their middleware chains to handlers.
///
/// Built once by [`KernelBuilder`]; immutable and cheap to clone afterwards,
/// so a transport can share one kernel across all connections.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use waypoint::{handler_fn, empty_request, IntoResponse, Kernel, RouteDefinition};
///
/// # tokio_test::block_on(async {
/// let kernel = Kernel::builder()
///     .register(|routes| {
///         routes.register(RouteDefinition::get("/users/{id}", "users.show"))?;
///         Ok(())
///     })
///     .handler("users.show", handler_fn(|ctx, _req| {
///         Box::pin(async move { Ok(format!("user {}", ctx.param("id").unwrap_or("?")).into_response()) })
///     }))
///     .build()?;
///
/// let dispatched = kernel.handle(empty_request(Method::GET, "/users/7")).await;
/// assert_eq!(dispatched.response.status(), 200);
/// dispatched.terminator.run(true).await;
/// # Ok::<(), waypoint::BootError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

/// The outcome of one request.
#[derive(Debug)]
pub struct Dispatched {
    /// The response to send.
    pub response: Response,
    /// Post-response hooks; run once the response has been handed off.
    pub terminator: Terminator,
}

impl Kernel {
    /// Starts building a kernel.
    #[must_use]
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    pub(crate) fn from_inner(inner: KernelInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The route table.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// Names of the middleware resolved for `route`, outermost first.
    #[must_use]
    pub fn middleware_for(&self, route: &Route) -> Vec<&str> {
        self.inner
            .chains
            .get(route.index())
            .map(ResolvedChain::names)
            .unwrap_or_default()
    }

    /// The configured request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.inner.request_timeout
    }

    /// Handles a request, bounded by the configured deadline if any.
    pub async fn handle(&self, request: Request) -> Dispatched {
        self.dispatch(request, self.inner.request_timeout).await
    }

    /// Handles a request, answering `504 Gateway Timeout` when the inbound
    /// phase outlives `limit`.
    ///
    /// Middleware entered before the deadline still have their terminate
    /// hooks run; their completion is never marked delivered.
    pub async fn handle_with_timeout(&self, request: Request, limit: Duration) -> Dispatched {
        self.dispatch(request, Some(limit)).await
    }

    async fn dispatch(&self, request: Request, limit: Option<Duration>) -> Dispatched {
        let request_id = self.request_id(&request);
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        let found = match self
            .inner
            .routes
            .match_route(&method, request_host(&request), &path)
        {
            Ok(found) => found,
            Err(miss) => {
                return Dispatched {
                    response: render_miss(&miss, request_id),
                    terminator: Terminator::empty(),
                }
            }
        };

        let route = found.route;
        let route_label = route.name().unwrap_or(UNNAMED_ROUTE).to_owned();
        let span = tracing::debug_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path,
            route = %route_label,
        );

        let mut ctx = RequestContext::with_request_id(request_id)
            .with_route_name(route.name())
            .with_params(found.params);
        ctx.set_handler(route.handler());

        let dispatch = match self.inner.chains.get(route.index()) {
            Some(chain) => Dispatch::new(chain.instantiate()),
            None => Dispatch::new(waypoint_middleware::Chain::default()),
        };
        let head = RequestHead::from_request(&request);
        let endpoint = self.endpoint(Arc::clone(&route));

        let outcome = {
            let run = AssertUnwindSafe(dispatch.run(&mut ctx, request, endpoint))
                .catch_unwind()
                .instrument(span.clone());
            match limit {
                Some(limit) => tokio::time::timeout(limit, run).await.ok(),
                None => Some(run.await),
            }
        };

        let _entered = span.enter();
        let timed_out = outcome.is_none();
        let mut response = match outcome {
            Some(Ok(Ok(response))) => response,
            Some(Ok(Err(err))) => render_error(&ctx, &err),
            Some(Err(payload)) => {
                tracing::error!(
                    { fields::ERROR } = %panic_message(payload.as_ref()),
                    "request handler panicked"
                );
                render_error(&ctx, &HandlerError::internal("request handler panicked"))
            }
            None => render_error(&ctx, &HandlerError::timeout("request deadline exceeded")),
        };
        set_request_id(&mut response, request_id);

        let status = response.status();
        record_request(&route_label, status.as_u16(), ctx.elapsed());
        tracing::debug!(
            { fields::HTTP_STATUS } = status.as_u16(),
            { fields::DURATION_MS } = ctx.elapsed().as_millis() as u64,
            "request finished"
        );

        let completion = Completion::new(head, &response);
        Dispatched {
            response,
            terminator: Terminator {
                state: Some(TerminateState {
                    hooks: dispatch.terminate_hooks(),
                    ctx,
                    completion,
                    timed_out,
                }),
                detached: self.inner.spawn_terminate,
            },
        }
    }

    fn endpoint(&self, route: Arc<Route>) -> Endpoint {
        let inner = Arc::clone(&self.inner);
        Endpoint::new(move |ctx, request| {
            Box::pin(async move { inner.invoke(&route, ctx, request).await })
        })
    }

    fn request_id(&self, request: &Request) -> RequestId {
        if !self.inner.trust_request_id {
            return RequestId::new();
        }
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(RequestId::parse)
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("routes", &self.inner.routes.len())
            .field("handlers", &self.inner.handlers)
            .field("bindings", &self.inner.bindings)
            .field("request_timeout", &self.inner.request_timeout)
            .finish_non_exhaustive()
    }
}

impl KernelInner {
    /// Binds models then calls the route's handler.
    async fn invoke(
        &self,
        route: &Route,
        ctx: &mut RequestContext,
        request: Request,
    ) -> HandlerResult<Response> {
        let handler_id = match self.bindings.bind(route.bindings(), ctx).await? {
            BindOutcome::Bound => route.handler(),
            BindOutcome::Missing { param, value } => match route.missing() {
                MissingModel::NotFound => return Err(HandlerError::model_not_found(param, value)),
                MissingModel::Redirect(location) => {
                    return Ok(Redirect::to(location.clone()).into_response())
                }
                MissingModel::Handler(fallback) => {
                    ctx.set_handler(fallback.clone());
                    fallback.as_str()
                }
            },
        };

        let handler = self.handlers.get(handler_id).ok_or_else(|| {
            HandlerError::internal(format!("handler '{handler_id}' is not registered"))
        })?;
        handler.call(ctx, request).await
    }
}

fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()))
}

fn render_miss(miss: &MatchError, request_id: RequestId) -> Response {
    let kind = match miss {
        MatchError::NotFound { .. } => MissKind::NotFound,
        MatchError::MethodNotAllowed { .. } => MissKind::MethodNotAllowed,
    };
    record_route_miss(kind);
    tracing::debug!(request_id = %request_id, kind = kind.as_str(), "{miss}");

    let error = match miss {
        MatchError::NotFound { .. } => HandlerError::not_found(miss.to_string()),
        MatchError::MethodNotAllowed { .. } => {
            HandlerError::with_status(StatusCode::METHOD_NOT_ALLOWED, miss.to_string())
        }
    };
    let mut response = error.to_response(Some(&request_id.to_string()));

    if !miss.allowed().is_empty() {
        let allow = miss
            .allowed()
            .iter()
            .map(http::Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::try_from(allow) {
            response.headers_mut().insert(ALLOW, value);
        }
    }
    set_request_id(&mut response, request_id);
    response
}

fn render_error(ctx: &RequestContext, err: &HandlerError) -> Response {
    let status = err.status_code().as_u16();
    if err.is_server_error() {
        tracing::error!(
            { fields::HTTP_STATUS } = status,
            { fields::ERROR } = %err,
            "request failed"
        );
    } else {
        tracing::warn!(
            { fields::HTTP_STATUS } = status,
            { fields::ERROR } = %err,
            "request rejected"
        );
    }
    err.to_response(Some(&ctx.request_id().to_string()))
}

fn set_request_id(response: &mut Response, request_id: RequestId) {
    if let Ok(value) = HeaderValue::try_from(request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

struct TerminateState {
    ctx: RequestContext,
    hooks: TerminateHooks,
    completion: Completion,
    timed_out: bool,
}

/// Runs the terminate hooks of one request.
///
/// Hold on to it until the response has been handed to the client, then
/// call [`run`](Self::run), [`spawn`](Self::spawn) or
/// [`finish`](Self::finish) with whether delivery succeeded.
pub struct Terminator {
    state: Option<TerminateState>,
    detached: bool,
}

impl Terminator {
    fn empty() -> Self {
        Self {
            state: None,
            detached: false,
        }
    }

    /// Whether there are no hooks to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.as_ref().map_or(true, |state| state.hooks.is_empty())
    }

    /// Names of the hooks that will run, in order.
    #[must_use]
    pub fn hooks(&self) -> Vec<&str> {
        self.state
            .as_ref()
            .map(|state| state.hooks.names())
            .unwrap_or_default()
    }

    /// Runs every hook in order and reports failures.
    pub async fn run(self, delivered: bool) -> TerminateReport {
        let Some(mut state) = self.state else {
            return TerminateReport::default();
        };
        state.completion.delivered = delivered && !state.timed_out;

        let report = state.hooks.run(&state.ctx, &state.completion).await;
        for failure in report.failures() {
            record_terminate_failure(failure.middleware());
        }
        report
    }

    /// Runs the hooks on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self, delivered: bool) -> JoinHandle<TerminateReport> {
        tokio::spawn(self.run(delivered))
    }

    /// Spawns or awaits the hooks, following `dispatch.spawn_terminate`.
    pub async fn finish(self, delivered: bool) {
        if self.is_empty() {
            return;
        }
        if self.detached {
            drop(self.spawn(delivered));
        } else {
            self.run(delivered).await;
        }
    }
}

impl std::fmt::Debug for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminator")
            .field("hooks", &self.hooks())
            .field("detached", &self.detached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use waypoint_core::empty_request;

    #[test]
    fn test_request_host_prefers_header() {
        let mut request = empty_request(Method::GET, "http://fallback.test/");
        assert_eq!(request_host(&request), Some("fallback.test"));

        request
            .headers_mut()
            .insert(HOST, HeaderValue::from_static("acme.example.com:8080"));
        assert_eq!(request_host(&request), Some("acme.example.com:8080"));
    }

    #[test]
    fn test_render_miss_sets_allow() {
        let miss = MatchError::MethodNotAllowed {
            method: Method::DELETE,
            path: "/users".to_owned(),
            allowed: vec![Method::GET, Method::HEAD, Method::POST],
        };
        let response = render_miss(&miss, RequestId::new());

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD, POST");
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[test]
    fn test_render_not_found_has_no_allow() {
        let miss = MatchError::NotFound {
            method: Method::GET,
            path: "/nope".to_owned(),
        };
        let response = render_miss(&miss, RequestId::new());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!response.headers().contains_key(ALLOW));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_empty_terminator_reports_nothing() {
        let terminator = Terminator::empty();
        assert!(terminator.is_empty());
        let report = terminator.run(true).await;
        assert_eq!(report.ran(), 0);
        assert!(report.is_clean());
    }
}
