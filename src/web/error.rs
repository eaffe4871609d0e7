// Error types for the API server

use super::models::ApiResponse;
use crate::{selection::SelectionError, upload::UploadError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

/// API server error types. Every variant is rendered as the
/// `{success: false, message}` envelope.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    MethodNotAllowed,
    UnsupportedFileType(mime::Mime),
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
            ),
            Self::UnsupportedFileType(mime) => (
                StatusCode::BAD_REQUEST,
                format!("Unsupported file type: {}", mime),
            ),
            Self::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            error!("Request failed with {}: {}", status, message);
        } else {
            warn!("Request rejected with {}: {}", status, message);
        }

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::UnsupportedType(mime) => Self::UnsupportedFileType(mime),
            UploadError::InvalidName(_) => Self::BadRequest("Invalid file name".to_string()),
            UploadError::Read(e) => {
                error!("Upload read failed: {}", e);
                Self::InternalServerError("Error reading file content".to_string())
            }
            UploadError::Rewind(e) => {
                error!("Upload rewind failed: {}", e);
                Self::InternalServerError("Error processing file".to_string())
            }
            UploadError::Create(e) => {
                error!("Creating upload destination failed: {}", e);
                Self::InternalServerError("Error creating file on server".to_string())
            }
            UploadError::Write(e) => {
                error!("Writing upload content failed: {}", e);
                Self::InternalServerError("Error saving file content".to_string())
            }
        }
    }
}

impl From<SelectionError> for ApiError {
    fn from(error: SelectionError) -> Self {
        match error {
            SelectionError::NotFound(_) => Self::NotFound("File not found".to_string()),
            SelectionError::Io(e) => {
                error!("Checking selected file failed: {}", e);
                Self::InternalServerError("Error checking file".to_string())
            }
        }
    }
}
