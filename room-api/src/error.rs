use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use room_orchestrator::OrchestratorError;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        let message = err.to_string();
        match err {
            OrchestratorError::InvalidSettings(_) | OrchestratorError::InvalidLabel(_) => {
                ApiError::BadRequest(message)
            }
            OrchestratorError::NotFound(_) => ApiError::NotFound(message),
            OrchestratorError::PortConflict(_) => ApiError::Conflict(message),
            OrchestratorError::PoolExhausted(_) | OrchestratorError::RuntimeUnavailable(_) => {
                ApiError::Unavailable(message)
            }
            OrchestratorError::Runtime(_) | OrchestratorError::RecreateFailed { .. } => {
                ApiError::Internal(message)
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {err}"))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Room operation did not complete: {err}"))
    }
}
