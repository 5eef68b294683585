//! Handler error types.
//!
//! A [`HandlerError`] is what a handler, a middleware or a model resolver
//! returns to abandon the inbound phase. The kernel's boundary turns it into
//! a JSON body shaped by [`ErrorEnvelope`]:
//!
//! ```json
//! {"error":{"status":405,"code":"method_not_allowed","message":"..."},"request_id":"..."}
//! ```
//!
//! The variants follow where a request can fail on its way through the
//! router: no route or no bound model (404), a status picked by the code
//! that rejected the request, a resolver's backing service (502), the
//! request deadline (504), and everything unexpected (500).

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`HandlerError`].
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Failure raised during the inbound phase of a request.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use waypoint_core::HandlerError;
///
/// fn require_token(token: Option<&str>) -> Result<&str, HandlerError> {
///     token.ok_or_else(|| HandlerError::with_status(StatusCode::UNAUTHORIZED, "login required"))
/// }
///
/// assert_eq!(require_token(None).unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
/// ```
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Nothing to serve: no route, or a bound parameter whose model is gone.
    #[error("{message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
        /// The parameter whose model could not be resolved, with its raw value.
        model: Option<MissingBinding>,
    },

    /// Rejected with a status chosen by the caller (401, 405, 409, ...).
    #[error("{message}")]
    Status {
        /// The status to render.
        status: StatusCode,
        /// Human-readable error message.
        message: String,
    },

    /// A model resolver's backing service failed.
    #[error("{service}: {message}")]
    Upstream {
        /// The service the resolver talks to.
        service: String,
        /// Human-readable error message.
        message: String,
    },

    /// The request deadline elapsed before the pipeline produced a response.
    #[error("{message}")]
    Timeout {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected failure. The source is logged, never rendered.
    #[error("{message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// A route parameter that resolved to no model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingBinding {
    /// Parameter name.
    pub param: String,
    /// Raw value captured from the path or host.
    pub value: String,
}

impl HandlerError {
    /// A plain 404.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            model: None,
        }
    }

    /// A 404 for a bound parameter with no model behind its value.
    #[must_use]
    pub fn model_not_found(param: impl Into<String>, value: impl Into<String>) -> Self {
        let model = MissingBinding {
            param: param.into(),
            value: value.into(),
        };
        Self::NotFound {
            message: format!("no model bound to '{}' for value '{}'", model.param, model.value),
            model: Some(model),
        }
    }

    /// An error that renders with `status`.
    #[must_use]
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// A resolver failure caused by `service`.
    #[must_use]
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// The request deadline elapsed.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// An unexpected failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// The status the boundary renders.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Status { status, .. } => *status,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true for errors that render as 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Machine-readable code: `model_not_found`, `deadline_exceeded`, or the
    /// snake-cased reason phrase of the status (`method_not_allowed`).
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::NotFound { model: Some(_), .. } => "model_not_found".to_owned(),
            Self::Timeout { .. } => "deadline_exceeded".to_owned(),
            Self::Upstream { .. } => "upstream_failed".to_owned(),
            other => reason_code(other.status_code()),
        }
    }

    /// The body rendered at the boundary.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        let (model, service) = match self {
            Self::NotFound { model, .. } => (model.clone(), None),
            Self::Upstream { service, .. } => (None, Some(service.clone())),
            _ => (None, None),
        };
        ErrorEnvelope {
            error: ErrorBody {
                status: self.status_code().as_u16(),
                code: self.code(),
                message: self.to_string(),
                model,
                service,
            },
            request_id: request_id.map(ToOwned::to_owned),
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(source: anyhow::Error) -> Self {
        Self::Internal {
            message: "internal error".to_owned(),
            source: Some(source),
        }
    }
}

fn reason_code(status: StatusCode) -> String {
    status.canonical_reason().map_or_else(
        || format!("http_{}", status.as_u16()),
        |reason| {
            reason
                .chars()
                .filter_map(|c| match c {
                    ' ' | '-' => Some('_'),
                    c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
                    _ => None,
                })
                .collect()
        },
    )
}

/// JSON body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// What went wrong.
    pub error: ErrorBody,
    /// Id of the request, echoed from the `x-request-id` response header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The `error` object of an [`ErrorEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Numeric HTTP status.
    pub status: u16,
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Set for `model_not_found`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<MissingBinding>,
    /// Set for `upstream_failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_allowed_code() {
        let error = HandlerError::with_status(StatusCode::METHOD_NOT_ALLOWED, "DELETE /users");
        assert_eq!(error.code(), "method_not_allowed");
        assert_eq!(error.to_envelope(None).error.status, 405);
        assert!(!error.is_server_error());
    }

    #[test]
    fn test_model_not_found_names_binding() {
        let envelope = HandlerError::model_not_found("user", "42").to_envelope(Some("req-1"));
        assert_eq!(envelope.error.code, "model_not_found");
        assert_eq!(
            envelope.error.model,
            Some(MissingBinding {
                param: "user".into(),
                value: "42".into()
            })
        );
        assert_eq!(envelope.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_route_miss_has_no_model() {
        let envelope = HandlerError::not_found("GET /nowhere").to_envelope(None);
        assert_eq!(envelope.error.code, "not_found");

        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json["error"].get("model").is_none());
        assert!(json.get("request_id").is_none());
    }

    #[test]
    fn test_upstream_reports_service() {
        let error = HandlerError::upstream("users", "connection reset");
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(error.to_string(), "users: connection reset");
        assert_eq!(error.to_envelope(None).error.service.as_deref(), Some("users"));
    }

    #[test]
    fn test_deadline() {
        let error = HandlerError::timeout("request deadline exceeded");
        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error.code(), "deadline_exceeded");
    }

    #[test]
    fn test_anyhow_source_stays_out_of_body() {
        let error: HandlerError = anyhow::anyhow!("pool exhausted at 10.0.0.3").into();
        assert!(error.is_server_error());
        assert!(std::error::Error::source(&error).is_some());

        let envelope = error.to_envelope(None);
        assert_eq!(envelope.error.code, "internal_server_error");
        assert!(!envelope.error.message.contains("10.0.0.3"));
    }

    #[test]
    fn test_nonstandard_status_code() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(HandlerError::with_status(status, "odd").code(), "http_599");
    }
}
