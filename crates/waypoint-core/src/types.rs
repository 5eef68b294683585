//! HTTP types shared by handlers, middleware and the kernel.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;

/// A fully buffered body.
pub type Body = Full<Bytes>;

/// The request type delivered by the transport.
pub type Request = http::Request<Body>;

/// The response type handed back to the transport.
pub type Response = http::Response<Body>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Extension trait for building plain responses.
pub trait ResponseExt {
    /// A response with `status` and an empty body.
    fn with_status(status: StatusCode) -> Response;

    /// A `text/plain` response.
    fn text(status: StatusCode, body: impl Into<String>) -> Response;

    /// An `application/json` response from pre-serialized bytes.
    fn json_bytes(status: StatusCode, body: impl Into<Bytes>) -> Response;
}

impl ResponseExt for Response {
    fn with_status(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn text(status: StatusCode, body: impl Into<String>) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from(body.into())));
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    fn json_bytes(status: StatusCode, body: impl Into<Bytes>) -> Response {
        let mut response = http::Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

/// Creates a request with an empty body. Mostly useful in tests.
#[must_use]
pub fn empty_request(method: http::Method, uri: &str) -> Request {
    let mut request = http::Request::new(Full::new(Bytes::new()));
    *request.method_mut() = method;
    if let Ok(uri) = uri.parse() {
        *request.uri_mut() = uri;
    }
    request
}
