//! HTTP error taxonomy and response body.

use std::any::Any;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::EngineError;
use crate::schema::ValidationErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationError,
    /// Requested dates overlap an existing reservation.
    Conflict,
    DatabaseError,
    UnknownError,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ValidationError | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
            ErrorKind::DatabaseError | ErrorKind::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body: `{"error": {"type", "message", "details"?}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub struct AppError(pub ErrorBody);

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self(ErrorBody {
            kind,
            message: message.into(),
            details: None,
        })
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.0.details = Some(details);
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "Unauthorized")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.kind.status();
        (status, Json(ErrorEnvelope { error: self.0 })).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errs: ValidationErrors) -> Self {
        let details = serde_json::to_value(&errs).unwrap_or(Value::Null);
        AppError::new(ErrorKind::ValidationError, "Validation failed").with_details(details)
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(_) => AppError::not_found(err.to_string()),
            EngineError::Forbidden(_) => AppError::new(ErrorKind::Forbidden, err.to_string()),
            EngineError::Conflict { .. } => {
                AppError::new(ErrorKind::Conflict, "Selected dates are no longer available")
            }
            EngineError::PriceMismatch { expected, .. } => {
                AppError::new(ErrorKind::ValidationError, "Validation failed").with_details(json!({
                    "totalPrice": [format!("Total price must be {expected}")]
                }))
            }
            EngineError::LimitExceeded(msg) => AppError::new(ErrorKind::ValidationError, msg),
            EngineError::WalError(e) => {
                tracing::error!("storage failure: {e}");
                AppError::new(ErrorKind::DatabaseError, "A storage error occurred")
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(ErrorKind::ValidationError, "Invalid request body")
            .with_details(json!({ "body": [rejection.body_text()] }))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::new(ErrorKind::ValidationError, "Invalid query parameters")
            .with_details(json!({ "query": [rejection.body_text()] }))
    }
}

/// Panic handler for `CatchPanicLayer`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("handler panicked: {detail}");
    AppError::new(ErrorKind::UnknownError, "An unexpected error occurred").into_response()
}
