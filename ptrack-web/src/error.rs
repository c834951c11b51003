//! HTTP error responses
//!
//! Every handler returns `Result<_, ApiError>`. Errors render as
//! `{"error": "..."}` with a matching status code; validation failures also
//! carry `"fields": {field: [messages]}`. Internal error details are logged
//! and never sent to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ptrack_common::{Error, FieldErrors};
use serde_json::json;
use tracing::error;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error.";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(FieldErrors),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    /// Validation failure on a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(field, message))
    }

    /// Report a UNIQUE constraint failure as a validation error on `field`
    ///
    /// Covers writes that lose a race after the explicit existence check.
    pub fn on_conflict(field: &'static str, message: &'static str) -> impl FnOnce(Error) -> ApiError {
        move |err| {
            if err.is_unique_violation() {
                ApiError::field(field, message)
            } else {
                err.into()
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(what) => ApiError::NotFound(format!("Not found: {}", what)),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Validation(fields) => ApiError::Validation(fields),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Please correct the errors below.",
                    "fields": fields,
                }),
            ),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": INTERNAL_ERROR_MESSAGE }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
