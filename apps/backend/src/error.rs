//! Error taxonomy for the backend API.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl maps
//! each signal to a status code and a `{"detail": "..."}` JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API error signals.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid input shape, out-of-range value, unknown enum member.
    #[error("{0}")]
    Validation(String),

    /// No entity matches the given path or identifier.
    #[error("{0}")]
    NotFound(String),

    /// The operation would violate a data invariant (e.g. duplicate card).
    #[error("{0}")]
    Integrity(String),

    /// A required dependency is absent or unreachable; names the dependency.
    #[error("{0}")]
    Unavailable(String),

    /// Unclassified database failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Unexpected condition.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Integrity(format!("uniqueness violated: {db}"))
            }
            sqlx::Error::Database(db)
                if db.is_check_violation() || db.is_foreign_key_violation() =>
            {
                ApiError::Integrity(format!("constraint violated: {db}"))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ApiError::Unavailable("database is unreachable".to_string())
            }
            _ => ApiError::Database(err),
        }
    }
}

/// Structured error body the frontend consumes.
#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Integrity(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Result type alias for handler and store operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_422() {
        let response = ApiError::Validation("score must be 0, 2, 3 or 5".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = ApiError::NotFound("vocab 42".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn integrity_maps_to_409() {
        let response = ApiError::Integrity("duplicate card".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unavailable_maps_to_503() {
        let response = ApiError::Unavailable("ollama is not running".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_maps_to_500() {
        let response = ApiError::Internal("unexpected".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn row_not_found_classifies_as_not_found() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
