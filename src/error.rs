use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::{inference::ProviderError, publisher::PublishError, upload::ValidationError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    UnsupportedType(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("AI Service Error: {0}")]
    Provider(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::UnsupportedType(_) | ServiceError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Provider(_)
            | ServiceError::Publish(_)
            | ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnsupportedType { .. } => {
                ServiceError::UnsupportedType(err.to_string())
            }
            ValidationError::TooLarge { .. } => ServiceError::PayloadTooLarge(err.to_string()),
        }
    }
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        ServiceError::Provider(err.to_string())
    }
}

impl From<PublishError> for ServiceError {
    fn from(err: PublishError) -> Self {
        ServiceError::Publish(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "detail": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
