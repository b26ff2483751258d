use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API-level error taxonomy. Validation problems are the caller's fault and
/// never retried; upstream failures surface a generic message while the
/// detail goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Credential codec error: {0}")]
    Codec(#[from] crate::crypto::CodecError),
    #[error("Upstream payment API error: {0}")]
    Upstream(#[from] crate::mpesa::client::DarajaError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<crate::phone::PhoneError> for AppError {
    fn from(e: crate::phone::PhoneError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<crate::mpesa::request::RequestError> for AppError {
    fn from(e: crate::mpesa::request::RequestError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Database(err) => {
                tracing::error!("database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Codec(err) => {
                tracing::error!("credential codec error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Upstream(err) => {
                tracing::error!("upstream payment API error: {}", err);
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment failed, please try again".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
