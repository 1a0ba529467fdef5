//! Mapping of [`MediaError`] onto HTTP responses.
//!
//! | Error                 | Status | `error`           |
//! |-----------------------|--------|-------------------|
//! | `Validation`          | 400    | `validation`      |
//! | `ContextInvalid`      | 400    | `context_invalid` |
//! | `Unauthorized`        | 401    | `unauthorized`    |
//! | `NotFound`            | 404    | `not_found`       |
//! | `Generation`          | 404    | `not_found`       |
//! | `RangeNotSatisfiable` | 416    | (no body)         |
//!
//! Only fixed messages reach the client. The detail carried by `NotFound`
//! and `Generation` is logged and dropped.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::MediaError;
use crate::stream::unsatisfiable_content_range;

pub const NOT_FOUND_MESSAGE: &str = "The requested media could not be found";
pub const UNAUTHORIZED_MESSAGE: &str = "You are not authorized to perform this action";

/// JSON error payload returned for every failure except 416.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,

    /// Error kind identifier (e.g. "not_found", "validation")
    pub error: String,

    /// Fixed human-readable message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            MediaError::RangeNotSatisfiable { size } => {
                debug!(size, "Range not satisfiable");
                return (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, unsatisfiable_content_range(*size))],
                )
                    .into_response();
            }

            MediaError::Validation(message) => {
                (StatusCode::BAD_REQUEST, "validation", message.clone())
            }

            MediaError::ContextInvalid(message) => {
                (StatusCode::BAD_REQUEST, "context_invalid", message.clone())
            }

            MediaError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                UNAUTHORIZED_MESSAGE.to_string(),
            ),

            MediaError::NotFound(detail) => {
                debug!(detail = %detail, "Media not found");
                (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    NOT_FOUND_MESSAGE.to_string(),
                )
            }

            // Reported exactly like a missing record
            MediaError::Generation(detail) => {
                warn!(detail = %detail, "Thumbnail generation failed");
                (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    NOT_FOUND_MESSAGE.to_string(),
                )
            }
        };

        if status != StatusCode::NOT_FOUND {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        (status, Json(ErrorResponse::new(error_type, message))).into_response()
    }
}
