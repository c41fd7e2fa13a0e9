//! Request-boundary error taxonomy and its mapping to HTTP responses.

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::http::{Response, StatusCode};
use crate::ideas::{UpstreamError, ValidationError};

/// Every failure a relay handler can surface to a client.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("upstream timed out")]
    Timeout,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream returned HTTP {status}")]
    UpstreamHttp { status: u16, message: Option<String> },

    #[error("upstream contract violation: {0}")]
    UpstreamFormat(String),

    #[error("unhandled error: {0}")]
    Unhandled(String),
}

impl From<UpstreamError> for RelayError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::Timeout => RelayError::Timeout,
            UpstreamError::Unavailable(detail) => RelayError::UpstreamUnavailable(detail),
            UpstreamError::Http { status, message } => RelayError::UpstreamHttp { status, message },
            UpstreamError::Format(detail) => RelayError::UpstreamFormat(detail),
            UpstreamError::Other(detail) => RelayError::Unhandled(detail),
        }
    }
}

/// Current UTC time as RFC 3339 with millisecond precision, e.g.
/// `2024-05-01T12:00:00.000Z`.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RelayError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::UpstreamHttp { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::UpstreamFormat(_) | RelayError::Unhandled(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Renders the error for the client. Internal detail is logged here and
    /// never placed in the body.
    pub fn into_response(self, path: &str) -> Response {
        let status = self.status();
        let body = match &self {
            RelayError::Validation(v) => json!({
                "error": v.to_string(),
                "message": v.message(),
                "reason": v.reason(),
                "timestamp": timestamp(),
                "path": path,
            }),
            RelayError::Timeout => error_body("Request timeout", path),
            RelayError::UpstreamUnavailable(_) => error_body("Service unavailable", path),
            RelayError::UpstreamHttp { message, .. } => {
                error_body(message.as_deref().unwrap_or("External API error"), path)
            }
            RelayError::UpstreamFormat(_) => error_body("Internal server error", path),
            RelayError::Unhandled(_) => json!({
                "error": "Internal server error",
                "message": "Something went wrong",
                "timestamp": timestamp(),
                "path": path,
            }),
        };

        if !matches!(self, RelayError::Validation(_)) {
            error!(path, status = status.as_u16(), error = %self, "request failed");
        }

        Response::json(status, &body)
    }
}

fn error_body(error: &str, path: &str) -> serde_json::Value {
    json!({
        "error": error,
        "timestamp": timestamp(),
        "path": path,
    })
}
