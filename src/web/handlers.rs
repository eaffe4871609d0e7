// API handlers for the web server

use super::{
    SharedAppState,
    error::ApiError,
    extract_request_data::{extract_form_field, extract_upload_file},
    models::*,
};
use crate::{sniff::sniff, storage, upload::read_sample};
use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode},
    response::Response,
};
use mime::Mime;
use std::{io::Cursor, path::Path};
use tokio::fs::File;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, error, info};
use uuid::Uuid;

// Fallback for POST-only routes
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

// --- POST /upload ---
// Validates and stores the multipart file field `image`
pub async fn upload_image(
    State(state): State<SharedAppState>,
    request: Request,
) -> Result<(StatusCode, Json<ApiResponse<UploadedImage>>), ApiError> {
    let request_id = Uuid::new_v4();
    let upload = extract_upload_file(request, "image").await?;
    info!(
        "Upload request: file_name={:?}, size={}, request_id={}",
        upload.file_name,
        upload.data.len(),
        request_id
    );

    let mut stream = Cursor::new(upload.data);
    let mime = state.validator.validate(&mut stream).await?;
    let filename = state
        .persister
        .persist(&mut stream, &upload.file_name)
        .await?;

    info!(
        "Stored upload as {} ({}), request_id={}",
        filename, mime, request_id
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "File uploaded successfully",
            UploadedImage { filename },
        )),
    ))
}

// --- ANY /stream ---
// Serves the currently selected file, with range and conditional request
// support
pub async fn stream_current_image(
    State(state): State<SharedAppState>,
    mut request: Request,
) -> Result<Response, ApiError> {
    let path = state
        .selection
        .current_path()
        .await
        .ok_or_else(|| ApiError::NotFound("No image currently selected".to_string()))?;

    let gone = || ApiError::NotFound("Selected image no longer exists".to_string());

    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return Err(gone()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(gone()),
        Err(e) => {
            error!("Failed to stat {}: {}", path.display(), e);
            return Err(ApiError::InternalServerError(
                "Error opening selected image".to_string(),
            ));
        }
    }

    let content_type = detect_content_type(&path).await.map_err(|e| {
        error!("Failed to read {}: {}", path.display(), e);
        ApiError::InternalServerError("Error reading selected image".to_string())
    })?;
    debug!("Streaming {} ({})", path.display(), content_type);

    // ServeFile only answers GET and HEAD; this route answers any method
    if request.method() != Method::HEAD {
        *request.method_mut() = Method::GET;
    }

    let response = ServeFile::new_with_mime(&path, &content_type)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    Ok(response.map(Body::new))
}

// Guesses from the extension, falling back to sniffing the head of the file
async fn detect_content_type(path: &Path) -> std::io::Result<Mime> {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return Ok(mime);
    }

    let mut file = File::open(path).await?;
    let sample = read_sample(&mut file).await?;
    Ok(sniff(&sample))
}

// --- POST /select-image ---
// Makes the form field `filename` the current image
pub async fn select_image(
    State(state): State<SharedAppState>,
    request: Request,
) -> Result<Json<ApiResponse>, ApiError> {
    let filename = extract_form_field(request, "filename")
        .await?
        .filter(|filename| !filename.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing filename parameter".to_string()))?;

    state.selection.select(&filename).await?;
    info!("Selected image: {}", filename);

    Ok(Json(ApiResponse::message("Image selected successfully")))
}

// --- ANY /images ---
// Lists stored files
pub async fn list_images(
    State(state): State<SharedAppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let files = storage::list_stored_files(state.persister.upload_dir())
        .await
        .map_err(|e| {
            error!("Failed to list upload directory: {}", e);
            ApiError::InternalServerError("Error reading upload directory".to_string())
        })?;

    debug!("Returning {} stored files", files.len());
    Ok(Json(ApiResponse::data(files)))
}

// --- ANY /current-image ---
pub async fn current_image(State(state): State<SharedAppState>) -> Json<ApiResponse<CurrentImage>> {
    let current = state.selection.current().await;
    Json(ApiResponse::data(CurrentImage { current }))
}
