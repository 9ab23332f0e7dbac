use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use profitboard_shared::error::join_fields;
use profitboard_shared::{DomainError, FieldError};
use profitboard_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid request: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests")]
    RateLimited,

    /// Persistence failure; the message is passed through to the caller.
    #[error("{0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("Not found".into()),
            StoreError::LastAdmin => ServerError::BadRequest(e.to_string()),
            other => ServerError::Store(other),
        }
    }
}

impl From<DomainError> for ServerError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(fields) => ServerError::Validation(fields),
            other => ServerError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::Validation(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Store(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = match &self {
            ServerError::Validation(fields) => serde_json::json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            ServerError::Internal(_) => serde_json::json!({
                "error": "Internal server error",
            }),
            _ => serde_json::json!({
                "error": self.to_string(),
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
