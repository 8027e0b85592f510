//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("schema load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed")]
    Validation { fields: BTreeMap<String, String> },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("permission denied")]
    Forbidden,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage failure")]
    Storage(String),
}

impl AppError {
    pub fn validation_one(field: &str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.into());
        AppError::Validation { fields }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            AppError::Schema(SchemaError::UnknownTable(_)) => (StatusCode::NOT_FOUND, "not_found", None),
            AppError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error", None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            AppError::Validation { fields } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                serde_json::to_value(fields).ok(),
            ),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None),
            AppError::Storage(detail) => {
                // Detail stays in the log; the body carries a generic message.
                tracing::error!(detail = %detail, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
        };
        let message = match &self {
            AppError::Storage(_) => "internal storage failure".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
