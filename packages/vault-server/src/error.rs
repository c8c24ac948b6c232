use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `PERMISSION_DENIED`, `NOT_FOUND`, `STORAGE_QUOTA_EXCEEDED`,
    /// `RETRYABLE_CONFLICT`, `STORAGE_BACKEND_ERROR`, `INTERNAL_ERROR`.
    #[schema(example = "NOT_FOUND")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "File not found or access denied")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    PermissionDenied,
    /// Absent, or present but not visible to the caller. The two are
    /// deliberately indistinguishable.
    NotFound(String),
    /// Storing the requested bytes would take the user past their quota.
    QuotaExceeded {
        used: i64,
        requested: i64,
        quota: i64,
    },
    /// A concurrent writer won a race. The whole operation is safe to retry.
    Conflict(String),
    /// The content store was unreachable or answered unexpectedly.
    StorageBackend(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::QuotaExceeded {
                used,
                requested,
                quota,
            } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody {
                    code: "STORAGE_QUOTA_EXCEEDED",
                    message: format!(
                        "Storage quota exceeded: {used} bytes used, {requested} bytes requested, {quota} bytes allowed"
                    ),
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "RETRYABLE_CONFLICT",
                    message: msg,
                },
            ),
            AppError::StorageBackend(detail) => {
                tracing::error!("Content store error: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        code: "STORAGE_BACKEND_ERROR",
                        message: "The storage backend is unavailable".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }

    /// Machine-readable code, as it appears in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::TokenMissing => "TOKEN_MISSING",
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::PermissionDenied => "PERMISSION_DENIED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::QuotaExceeded { .. } => "STORAGE_QUOTA_EXCEEDED",
            AppError::Conflict(_) => "RETRYABLE_CONFLICT",
            AppError::StorageBackend(_) => "STORAGE_BACKEND_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            AppError::StorageBackend(_) => "The storage backend is unavailable".into(),
            AppError::Internal(_) => "An unexpected error occurred".into(),
            other => other.code().to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            return AppError::Conflict("Concurrent update, please retry".into());
        }
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                AppError::NotFound(format!("Object not found in content store: {key}"))
            }
            StorageError::InvalidHash(msg) => AppError::Validation(msg),
            other => AppError::StorageBackend(other.to_string()),
        }
    }
}
