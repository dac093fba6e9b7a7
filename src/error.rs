//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] covers caller errors raised before a stream is opened
//! or an event is accepted. Delivery failures never surface here: a dead
//! subscriber is pruned inside the publisher and only shows up in its
//! [`crate::domain::DeliveryReport`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "missing required parameter: groupId"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category   | HTTP Status               |
/// |-----------|------------|---------------------------|
/// | 1000–1999 | Validation | 400 Bad Request           |
/// | 2000–2999 | Not Found  | 404 Not Found             |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A parameter required by the channel family was absent or blank.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// The published event body was not a valid event.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// No channel family with this name is configured.
    #[error("unknown channel family: {0}")]
    UnknownChannelFamily(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MissingParameter(_) => 1001,
            Self::InvalidEvent(_) => 1002,
            Self::UnknownChannelFamily(_) => 2001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) | Self::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            Self::UnknownChannelFamily(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!(error = %self, %status, "request rejected");
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
