//! Handler error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nesora_core::NesoraError;
use serde_json::{json, Value};
use thiserror::Error;

/// An error returned from a handler as `(status, JSON body)`.
#[derive(Debug, Error)]
#[error("{status}: {body}")]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiError {
    /// Error with an arbitrary JSON body.
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Error with body `{"error": message}`.
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, json!({ "error": message.into() }))
    }
}

impl From<NesoraError> for ApiError {
    fn from(err: NesoraError) -> Self {
        match err {
            NesoraError::Gateway { status, message } => Self::message(
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                message,
            ),
            NesoraError::InvalidRequest(message) => Self::message(StatusCode::BAD_REQUEST, message),
            NesoraError::Config(message) => {
                Self::message(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            other => Self::message(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
