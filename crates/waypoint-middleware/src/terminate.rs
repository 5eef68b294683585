//! Post-response terminate hooks.
//!
//! After the transport has sent a response, every entered middleware that
//! reports itself terminable gets its `terminate` hook called, outermost
//! first. Hooks see a snapshot of the request and response heads. A failure
//! in one hook, whether an error or a panic, is recorded and the remaining
//! hooks still run.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::{HeaderMap, Method, StatusCode, Uri};
use waypoint_core::{Request, RequestContext, Response};

use crate::chain::ChainEntry;
use crate::error::TerminateHookError;

/// Method, URI and headers of the original request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Snapshots `request`.
    #[must_use]
    pub fn from_request(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// What terminate hooks learn about the finished request.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The request head.
    pub request: RequestHead,
    /// Status of the response produced.
    pub status: StatusCode,
    /// Headers of the response produced.
    pub headers: HeaderMap,
    /// Whether the transport delivered the response.
    pub delivered: bool,
}

impl Completion {
    /// Snapshots `response`. `delivered` starts false; the transport sets
    /// it when handing the completion to the hooks.
    #[must_use]
    pub fn new(request: RequestHead, response: &Response) -> Self {
        Self {
            request,
            status: response.status(),
            headers: response.headers().clone(),
            delivered: false,
        }
    }
}

/// Outcome of running a request's terminate hooks.
#[derive(Debug, Default)]
pub struct TerminateReport {
    ran: usize,
    failures: Vec<TerminateHookError>,
}

impl TerminateReport {
    /// Number of hooks invoked, failed ones included.
    #[must_use]
    pub fn ran(&self) -> usize {
        self.ran
    }

    /// Hooks that failed, in invocation order.
    #[must_use]
    pub fn failures(&self) -> &[TerminateHookError] {
        &self.failures
    }

    /// Whether every hook succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The terminable middleware entered during one request.
#[derive(Debug, Clone, Default)]
pub struct TerminateHooks {
    entries: Vec<ChainEntry>,
}

impl TerminateHooks {
    /// Keeps the terminable entries among `entered`, preserving order.
    #[must_use]
    pub fn from_entered(entered: &[ChainEntry]) -> Self {
        Self {
            entries: entered
                .iter()
                .filter(|entry| entry.middleware().terminable())
                .cloned()
                .collect(),
        }
    }

    /// Names of the hooks, in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(ChainEntry::name).collect()
    }

    /// Number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every hook in order, isolating failures.
    pub async fn run(&self, ctx: &RequestContext, completion: &Completion) -> TerminateReport {
        let mut report = TerminateReport::default();

        for entry in &self.entries {
            report.ran += 1;
            let hook = async { entry.middleware().terminate(ctx, completion).await };

            let failure = match AssertUnwindSafe(hook).catch_unwind().await {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => TerminateHookError::Failed {
                    middleware: entry.name().to_string(),
                    source,
                },
                Err(payload) => TerminateHookError::Panicked {
                    middleware: entry.name().to_string(),
                    message: panic_message(payload.as_ref()),
                },
            };

            tracing::warn!(
                request_id = %ctx.request_id(),
                middleware = %entry.name(),
                error = %failure,
                "terminate hook failed"
            );
            report.failures.push(failure);
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_completion_snapshot() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/orders")
            .header("x-trace", "abc")
            .body(waypoint_core::Body::default())
            .unwrap();
        let mut response = Response::new(waypoint_core::Body::default());
        *response.status_mut() = StatusCode::CREATED;

        let completion = Completion::new(RequestHead::from_request(&request), &response);
        assert_eq!(completion.status, StatusCode::CREATED);
        assert_eq!(completion.request.method, Method::POST);
        assert_eq!(completion.request.headers["x-trace"], "abc");
        assert!(!completion.delivered);
    }

    #[test]
    fn test_hooks_keep_terminable_only() {
        let plain = crate::middleware::from_fn("plain", |ctx, req, _args, next| {
            Box::pin(async move { next.run(ctx, req).await })
        });
        let entries = vec![ChainEntry::new("plain", Vec::new(), Arc::new(plain))];
        assert!(TerminateHooks::from_entered(&entries).is_empty());
    }
}
