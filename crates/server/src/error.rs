use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::error::TodoServiceError;
use thiserror::Error;

use crate::response::ApiResponse;

const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] TodoServiceError),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Service(err) => match err {
                TodoServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
                TodoServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
                TodoServiceError::Hierarchy(_) => (StatusCode::BAD_REQUEST, "InvalidHierarchy"),
                TodoServiceError::Conflict { .. } => (StatusCode::CONFLICT, "Conflict"),
                TodoServiceError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError")
                }
                TodoServiceError::BlobStore(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "BlobStoreError")
                }
            },
            ApiError::Multipart(err) => (err.status(), "MultipartError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status_and_type();

        let error_message = match &self {
            ApiError::Multipart(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "This file is too large.".to_string()
            }
            ApiError::Multipart(_) => {
                "Failed to upload file. Please ensure the file is valid and try again.".to_string()
            }
            ApiError::BadRequest(msg) => msg.clone(),
            // Store and upstream failures stay opaque to the caller.
            _ if status_code.is_server_error() => INTERNAL_ERROR_MESSAGE.to_string(),
            _ => self.to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
