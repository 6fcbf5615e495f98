use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("clientId and callbackUrl required")]
    MissingFields,
    #[error("invalid callbackUrl: {0}")]
    InvalidUrl(String),
    #[error("client {0} not registered")]
    NotRegistered(String),
    #[error("forwarding failed: {0}")]
    Forward(#[from] reqwest::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            RelayError::MissingFields | RelayError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            RelayError::NotRegistered(_) => StatusCode::NOT_FOUND,
            RelayError::Forward(_) => StatusCode::BAD_GATEWAY,
        };
        (
            status,
            Json(json!({ "result": "error", "message": self.to_string() })),
        )
            .into_response()
    }
}
