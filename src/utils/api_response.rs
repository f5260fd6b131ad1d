use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::EngineError;

/// Machine-readable error taxonomy carried alongside the HTTP status so the
/// frontend can distinguish "fix your input" from "you may not do this" from
/// "sign in again" without string-matching messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    AuthorizationError,
    NotFound,
    Conflict,
    Unauthorized,
    AuthExpired,
    InternalError,
}

#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            error_code: None,
            timestamp: Utc::now().to_rfc3339(),
            data: Some(data),
            errors: None,
        }
    }

    /// Create an error response
    pub fn error(
        status: StatusCode,
        code: ErrorCode,
        message: impl Into<String>,
        errors: Option<serde_json::Value>,
    ) -> Self {
        ApiResponse {
            success: false,
            status_code: status.as_u16(),
            message: message.into(),
            error_code: Some(code),
            timestamp: Utc::now().to_rfc3339(),
            data: None,
            errors,
        }
    }
}

impl ApiResponse<()> {
    /// Database failures surface as a single generic error; the detail goes
    /// into `errors` for operators, not end users.
    pub fn db_error(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ApiResponse::error(
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                "Record not found",
                None,
            ),
            other => ApiResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                "Database operation failed",
                Some(serde_json::json!({ "error": other.to_string() })),
            ),
        }
    }
}

impl From<EngineError> for ApiResponse<()> {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Validation(_) => ApiResponse::error(
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::ValidationError,
                message,
                None,
            ),
            EngineError::Authorization(_) => ApiResponse::error(
                StatusCode::FORBIDDEN,
                ErrorCode::AuthorizationError,
                message,
                None,
            ),
            EngineError::InvalidTransition(_) => {
                ApiResponse::error(StatusCode::CONFLICT, ErrorCode::Conflict, message, None)
            }
        }
    }
}
