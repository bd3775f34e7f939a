use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cce_policy::{SubmissionDenied, SurveyError};
use cce_types::api::ErrorBody;
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced to clients as `{ code, message }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::PermissionDenied(_) => "permission-denied",
            Self::InvalidArgument(_) => "invalid-argument",
            Self::NotFound(_) => "not-found",
            Self::AlreadyExists(_) => "already-exists",
            Self::FailedPrecondition(_) => "failed-precondition",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::FailedPrecondition(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthenticated("The function must be called while authenticated.".into())
    }

    pub fn admin_only() -> Self {
        Self::PermissionDenied("Only admins can perform this operation.".into())
    }

    pub fn internal(what: &str) -> Self {
        Self::Internal(format!("Failed to {}", what))
    }
}

impl From<SubmissionDenied> for ApiError {
    fn from(denied: SubmissionDenied) -> Self {
        match denied {
            SubmissionDenied::NotSignedIn => Self::unauthenticated(),
            other => Self::FailedPrecondition(other.to_string()),
        }
    }
}

impl From<SurveyError> for ApiError {
    fn from(e: SurveyError) -> Self {
        match e {
            SurveyError::Denied(denied) => denied.into(),
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}: {}", self.code(), self);
        } else {
            warn!("{}: {}", self.code(), self);
        }

        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
