use axum::{http::StatusCode, response::IntoResponse, Json};
use jobsim_engine::JobError;
use serde_json::json;
use thiserror::Error;

/// Top-level API error shared by all route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Job(err) => match err {
                JobError::NotFound(_) | JobError::ClientNotFound(_) => StatusCode::NOT_FOUND,
                JobError::DuplicateId(_)
                | JobError::MissingClient
                | JobError::InvalidParams(_)
                | JobError::AlreadyTerminal { .. } => StatusCode::BAD_REQUEST,
                JobError::EngineAlreadyRunning => StatusCode::CONFLICT,
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_client_error() {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
