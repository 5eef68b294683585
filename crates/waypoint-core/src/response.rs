//! Conversions from handler values into HTTP responses.
//!
//! | Value | Status | Content-Type |
//! |-------|--------|--------------|
//! | `&'static str`, `String` | 200 | `text/plain; charset=utf-8` |
//! | `serde_json::Value`, [`Json<T>`] | 200 | `application/json` |
//! | `(StatusCode, T)` | given | from `T` |
//! | [`Redirect`] | 301/302/303/307/308 | none |
//! | [`Response`] | unchanged | unchanged |

use bytes::Bytes;
use http::header::{HeaderValue, LOCATION};
use http::StatusCode;
use serde::Serialize;

use crate::error::HandlerError;
use crate::types::{Response, ResponseExt};

/// Conversion into a [`Response`].
pub trait IntoResponse {
    /// Builds the response.
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::text(StatusCode::OK, self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(StatusCode::OK, self)
    }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        Response::with_status(self)
    }
}

impl<T: IntoResponse> IntoResponse for (StatusCode, T) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;
        response
    }
}

/// A JSON body.
///
/// Serialization failures render as a 500 response.
///
/// ```
/// use waypoint_core::{IntoResponse, Json};
///
/// let response = Json(serde_json::json!({ "id": 1 })).into_response();
/// assert_eq!(response.headers()["content-type"], "application/json");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => Response::json_bytes(StatusCode::OK, body),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize JSON response");
                HandlerError::internal("response serialization failed").into_response()
            }
        }
    }
}

/// An HTTP redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    status: StatusCode,
    location: String,
}

impl Redirect {
    /// 302 Found.
    pub fn to(location: impl Into<String>) -> Self {
        Self::with_status(StatusCode::FOUND, location)
    }

    /// 301 Moved Permanently.
    pub fn permanent(location: impl Into<String>) -> Self {
        Self::with_status(StatusCode::MOVED_PERMANENTLY, location)
    }

    /// 303 See Other.
    pub fn see_other(location: impl Into<String>) -> Self {
        Self::with_status(StatusCode::SEE_OTHER, location)
    }

    /// 307 Temporary Redirect.
    pub fn temporary(location: impl Into<String>) -> Self {
        Self::with_status(StatusCode::TEMPORARY_REDIRECT, location)
    }

    fn with_status(status: StatusCode, location: impl Into<String>) -> Self {
        Self {
            status,
            location: location.into(),
        }
    }

    /// The redirect status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The target location.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        match HeaderValue::try_from(self.location) {
            Ok(location) => {
                let mut response = Response::with_status(self.status);
                response.headers_mut().insert(LOCATION, location);
                response
            }
            Err(err) => {
                tracing::error!(error = %err, "invalid redirect location");
                HandlerError::internal("invalid redirect location").into_response()
            }
        }
    }
}

impl HandlerError {
    /// Renders the JSON error envelope with this error's status.
    #[must_use]
    pub fn to_response(&self, request_id: Option<&str>) -> Response {
        let envelope = self.to_envelope(request_id);
        let body = serde_json::to_vec(&envelope).map_or_else(
            |_| Bytes::from_static(br#"{"error":{"status":500,"code":"internal_server_error"}}"#),
            Bytes::from,
        );
        Response::json_bytes(self.status_code(), body)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        self.to_response(None)
    }
}
