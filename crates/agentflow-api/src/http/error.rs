//! Application error type mapping run-level failures to HTTP responses.
//!
//! Every error body has the shape `{ "error": "<message>" }`. Per-node
//! failures never reach this type; they live inside `nodeResults`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use agentflow_core::flow::executor::ExecutionError;
use agentflow_types::error::RequestError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Body is not valid JSON.
    Body(String),
    /// Body is JSON but not a schedulable flow request.
    Request(RequestError),
    /// Strict mode: some nodes were never scheduled.
    Unscheduled {
        message: String,
        cyclic: Vec<String>,
        blocked: Vec<String>,
    },
}

impl From<RequestError> for AppError {
    fn from(e: RequestError) -> Self {
        AppError::Request(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Body(rejection.body_text())
    }
}

impl From<ExecutionError> for AppError {
    fn from(e: ExecutionError) -> Self {
        let message = e.to_string();
        match e {
            ExecutionError::Request(e) => AppError::Request(e),
            ExecutionError::UnscheduledNodes { cyclic, blocked } => AppError::Unscheduled {
                message,
                cyclic,
                blocked,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Body(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            AppError::Request(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
            AppError::Unscheduled {
                message,
                cyclic,
                blocked,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message, "cyclic": cyclic, "blocked": blocked }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
