use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

use crate::assets::AssetError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`,
    /// `VALIDATION_REJECTED`, `STORAGE_FAILURE`, `CATALOG_FAILURE`,
    /// `NOT_FOUND`, `CONFLICT`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_REJECTED")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "menu.bmp: unsupported file type 'image/bmp' (allowed: JPEG, PNG, WebP, GIF)")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    /// Malformed request: bad JSON, missing multipart field, bad id list.
    Validation(String),
    /// An uploaded file failed type or size checks.
    ValidationRejected(String),
    /// The object store failed; the message names the stage, not the cause.
    Storage(String),
    /// The catalog failed; the message names the stage, not the cause.
    Catalog(String),
    NotFound(String),
    Conflict(String),
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
            AppError::ValidationRejected(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    code: "VALIDATION_REJECTED",
                    message: msg,
                },
            ),
            AppError::Storage(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    code: "STORAGE_FAILURE",
                    message: msg,
                },
            ),
            AppError::Catalog(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    code: "CATALOG_FAILURE",
                    message: msg,
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
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
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) | StorageError::InvalidKey(_) => {
                AppError::NotFound("Object not found".into())
            }
            other => {
                tracing::error!(error = %other, "Object store failure");
                AppError::Storage("Object store is unavailable".into())
            }
        }
    }
}

impl From<AssetError> for AppError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::ValidationRejected(rejection) => {
                AppError::ValidationRejected(rejection.to_string())
            }
            AssetError::InvalidRequest(msg) => AppError::Validation(msg),
            AssetError::NotFound(msg) => AppError::NotFound(msg),
            AssetError::Conflict(msg) => AppError::Conflict(msg),
            AssetError::Storage { stage, ref source } => {
                tracing::error!(%stage, error = %source, "Object store failure");
                AppError::Storage(format!(
                    "{}; no changes were made to the catalog",
                    err.public_message()
                ))
            }
            AssetError::Catalog { stage, ref source } => {
                tracing::error!(%stage, error = %source, "Catalog failure");
                AppError::Catalog(err.public_message())
            }
        }
    }
}
