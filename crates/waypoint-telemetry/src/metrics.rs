//! Request metrics.
//!
//! Recording goes through the `metrics` facade. Without an installed
//! recorder every call is a no-op, so the kernel records unconditionally.
//!
//! ```rust
//! use std::time::Duration;
//! use waypoint_telemetry::metrics::record_request;
//!
//! record_request("users.show", 200, Duration::from_millis(12));
//! ```

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Counter of dispatched requests.
pub const REQUESTS_TOTAL: &str = "waypoint_requests_total";

/// Histogram of inbound phase latency.
pub const REQUEST_DURATION_SECONDS: &str = "waypoint_request_duration_seconds";

/// Counter of requests no route served.
pub const ROUTE_MISSES_TOTAL: &str = "waypoint_route_misses_total";

/// Counter of failed terminate hooks.
pub const TERMINATE_FAILURES_TOTAL: &str = "waypoint_terminate_failures_total";

/// Label used for requests whose route has no name.
pub const UNNAMED_ROUTE: &str = "unnamed";

/// Why no route served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissKind {
    /// No route matched the path and host.
    NotFound,
    /// A route matched but not for this method.
    MethodNotAllowed,
}

impl MissKind {
    /// The `kind` label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
        }
    }
}

/// Registers descriptions for the standard metrics with the installed
/// recorder.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of requests dispatched to a route");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Time from dispatch to response, excluding terminate hooks"
    );
    describe_counter!(ROUTE_MISSES_TOTAL, "Requests answered with 404 or 405");
    describe_counter!(
        TERMINATE_FAILURES_TOTAL,
        "Terminate hooks that returned an error or panicked"
    );
}

/// Records a request that reached a route.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "route" => route.to_string())
        .record(duration.as_secs_f64());
}

/// Records a request no route served.
pub fn record_route_miss(kind: MissKind) {
    counter!(ROUTE_MISSES_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Records a failed terminate hook.
pub fn record_terminate_failure(middleware: &str) {
    counter!(TERMINATE_FAILURES_TOTAL, "middleware" => middleware.to_string()).increment(1);
}
