//! Onion execution of one request's chain.

use std::sync::atomic::{AtomicUsize, Ordering};

use waypoint_core::{HandlerResult, Request, RequestContext, Response};

use crate::chain::Chain;
use crate::middleware::{Endpoint, Next};
use crate::terminate::TerminateHooks;

/// Runs a [`Chain`] around an [`Endpoint`] and remembers how far the
/// request got.
///
/// The entered count survives cancellation: when the inbound future is
/// dropped at a deadline, [`terminate_hooks`](Self::terminate_hooks) still
/// reports the middleware that were entered before it.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use waypoint_core::{empty_request, IntoResponse, RequestContext};
/// use waypoint_middleware::{Chain, Dispatch, Endpoint};
///
/// # tokio_test::block_on(async {
/// let dispatch = Dispatch::new(Chain::default());
/// let endpoint = Endpoint::new(|_ctx, _req| Box::pin(async { Ok("hi".into_response()) }));
///
/// let mut ctx = RequestContext::new();
/// let response = dispatch
///     .run(&mut ctx, empty_request(Method::GET, "/"), endpoint)
///     .await
///     .unwrap();
/// assert_eq!(response.status(), 200);
/// # });
/// ```
#[derive(Debug)]
pub struct Dispatch {
    chain: Chain,
    entered: AtomicUsize,
}

impl Dispatch {
    /// Prepares to run `chain`.
    #[must_use]
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            entered: AtomicUsize::new(0),
        }
    }

    /// Runs the chain once.
    pub async fn run(
        &self,
        ctx: &mut RequestContext,
        request: Request,
        endpoint: Endpoint,
    ) -> HandlerResult<Response> {
        Next::new(self.chain.entries(), endpoint, &self.entered)
            .run(ctx, request)
            .await
    }

    /// Number of middleware whose `handle` was entered.
    #[must_use]
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst).min(self.chain.len())
    }

    /// Terminate hooks of the entered middleware, outermost first.
    #[must_use]
    pub fn terminate_hooks(&self) -> TerminateHooks {
        TerminateHooks::from_entered(&self.chain.entries()[..self.entered()])
    }
}
