use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blob_core::CoreError;
use common::service::ServiceError;
use common::signed::TokenError;
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`,
    /// `SIGNATURE_INVALID`, `NOT_FOUND`, `UNREPRESENTABLE`,
    /// `CHECKSUM_MISMATCH`, `BACKEND_UNAVAILABLE`, `CONTENDED`,
    /// `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Missing 'file' field")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// Signed id or token failed verification (bad signature, expiry,
    /// purpose mismatch).
    SignatureInvalid,
    NotFound(String),
    /// The blob cannot be transformed into the requested representation.
    Unrepresentable(String),
    ChecksumMismatch,
    /// The storage backend rejected or timed out the request.
    BackendUnavailable,
    /// Variant generation lock could not be acquired. Contains seconds
    /// until retry is reasonable.
    Contended {
        retry_after: u64,
    },
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
            AppError::SignatureInvalid => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "SIGNATURE_INVALID",
                    message: "Invalid or expired signed reference".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Unrepresentable(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "UNREPRESENTABLE",
                    message: msg,
                },
            ),
            AppError::ChecksumMismatch => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    code: "CHECKSUM_MISMATCH",
                    message: "Uploaded bytes do not match the declared checksum".into(),
                },
            ),
            AppError::BackendUnavailable => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    code: "BACKEND_UNAVAILABLE",
                    message: "Storage backend is unavailable".into(),
                },
            ),
            AppError::Contended { retry_after } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    code: "CONTENDED",
                    message: format!(
                        "Representation is being generated. Try again in {retry_after} seconds"
                    ),
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
        let retry_after = if let AppError::Contended { retry_after } = &self {
            Some(*retry_after)
        } else {
            None
        };

        let (status, body) = self.status_and_body();

        if let Some(seconds) = retry_after {
            (status, [("Retry-After", seconds.to_string())], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        tracing::debug!("token rejected: {err}");
        AppError::SignatureInvalid
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(key) => {
                tracing::warn!(key, "backend object missing");
                AppError::NotFound("Object not found".into())
            }
            ServiceError::ChecksumMismatch { .. } => AppError::ChecksumMismatch,
            ServiceError::Unavailable(detail) => {
                tracing::error!("backend unavailable: {detail}");
                AppError::BackendUnavailable
            }
            ServiceError::InvalidChecksum(detail) | ServiceError::InvalidKey(detail) => {
                AppError::Validation(detail)
            }
            ServiceError::Io(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            CoreError::Unrepresentable(detail) => AppError::Unrepresentable(detail),
            CoreError::Contended => AppError::Contended { retry_after: 5 },
            CoreError::Processing(detail) => AppError::Internal(detail),
            CoreError::UnknownOwnerKind(kind) => {
                AppError::Validation(format!("Unknown owner kind '{kind}'"))
            }
            CoreError::UnknownService(name) => {
                tracing::error!(service = name, "blob references unconfigured service");
                AppError::Internal(format!("unknown service '{name}'"))
            }
            CoreError::Validation(msg) => AppError::Validation(msg),
            CoreError::Service(e) => e.into(),
            CoreError::Db(e) => e.into(),
            CoreError::Queue(detail) => AppError::Internal(detail),
        }
    }
}
