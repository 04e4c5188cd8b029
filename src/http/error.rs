use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Request-level error taxonomy. Every fault is terminal for its request and
/// reported synchronously in the response body; there are no retries.
#[derive(Debug)]
pub enum ApiError {
    /// A required field was absent: 400 with a field-specific message.
    MissingField(&'static str),
    /// Lookup miss: 404.
    NotFound(&'static str),
    /// Store or runtime fault: 500 carrying the raw underlying message.
    /// Leaking internals is part of the demo's insecure-by-design contract.
    Store(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingField(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Store(err) => {
                error!("store error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": err.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Store(err)
    }
}
