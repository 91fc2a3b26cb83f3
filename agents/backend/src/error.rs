use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Traction request failed: {0}")]
    Traction(#[from] reqwest::Error),
    #[error("Traction returned an unusable response: {0}")]
    TractionResponse(String),
    #[error("Authentication with Traction failed: {0}")]
    Auth(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::BAD_GATEWAY,
            Self::Traction(_) | Self::TractionResponse(_) => StatusCode::BAD_GATEWAY,
        };
        error!("Request failed: {}", self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
