use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use editer_core::ServiceError;
use serde::Serialize;

/// Errors returned to API clients.
///
/// Server-side causes are logged where they happen; the client only ever
/// sees a code and a generic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Body missing, not JSON, or `content` not a string
    InvalidRequest(String),
    EmptyContent,
    ContentTooLarge(String),
    NotFound,
    Internal,
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::EmptyContent | ApiError::ContentTooLarge(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::EmptyContent => "empty_content",
            ApiError::ContentTooLarge(_) => "content_too_large",
            ApiError::NotFound => "not_found",
            ApiError::Internal => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::InvalidRequest(msg) | ApiError::ContentTooLarge(msg) => msg.clone(),
            ApiError::EmptyContent => "Content must not be empty".to_string(),
            ApiError::NotFound => "Document not found".to_string(),
            ApiError::Internal => "Internal server error".to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(_) => {
                ApiError::ContentTooLarge("Content exceeds the storage limit".to_string())
            }
            ServiceError::StorageUnavailable(_) | ServiceError::Failure(_) => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorBody {
                error: self.code(),
                message: self.message(),
            }),
        )
            .into_response()
    }
}
