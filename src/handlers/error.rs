//! HTTP error mapping

use crate::db::complaints::MutationError;
use crate::engine::EngineError;
use crate::models::ApiResponse;
use crate::storage::PhotoStoreError;
use crate::validation::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Photo storage error: {0}")]
    Storage(#[from] PhotoStoreError),

    #[error("Password hashing failed")]
    PasswordHash,
}

impl From<MutationError> for ApiError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::Engine(e) => ApiError::Engine(e),
            MutationError::Database(e) => ApiError::Database(e),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::Forbidden => StatusCode::FORBIDDEN,
                EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
                EngineError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
                EngineError::NotEligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::AlreadyFinalized => StatusCode::CONFLICT,
                EngineError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Storage(PhotoStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(PhotoStoreError::AlreadyExists(_)) => StatusCode::CONFLICT,
            ApiError::Storage(PhotoStoreError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Storage(_) | ApiError::PasswordHash => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("{}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

/// Unique-constraint violations become a 409 with `message`; everything else
/// stays a database error.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::Conflict(message.to_string())
        }
        _ => ApiError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComplaintStatus;

    #[test]
    fn test_engine_status_codes() {
        let cases = [
            (EngineError::Forbidden, StatusCode::FORBIDDEN),
            (
                EngineError::InvalidTransition {
                    from: ComplaintStatus::Open,
                    to: ComplaintStatus::Resolved,
                },
                StatusCode::CONFLICT,
            ),
            (
                EngineError::PreconditionFailed("x".into()),
                StatusCode::PRECONDITION_FAILED,
            ),
            (
                EngineError::NotEligible("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (EngineError::AlreadyFinalized, StatusCode::CONFLICT),
            (EngineError::NotFound, StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_mutation_error_unwraps_engine_error() {
        let err = ApiError::from(MutationError::Engine(EngineError::NotFound));
        assert!(matches!(err, ApiError::Engine(EngineError::NotFound)));
    }

    #[test]
    fn test_other_status_codes() {
        assert_eq!(
            ApiError::Validation(ValidationError::InvalidPublicId).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::TooManyRequests("slow down".into()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Storage(PhotoStoreError::AlreadyExists("p1".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflict_on_unique_passes_other_errors_through() {
        let err = conflict_on_unique(sqlx::Error::RowNotFound, "taken");
        assert!(matches!(err, ApiError::Database(_)));
    }
}
