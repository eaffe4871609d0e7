use axum::{
    body::Bytes,
    extract::{Form, FromRequest, Multipart, Query, Request},
    http::header,
};
use tracing::{debug, warn};

use super::error::ApiError;

/// A file part taken from a multipart upload.
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

// Extracts the first file part named `field_name` from a multipart request
pub async fn extract_upload_file(
    request: Request,
    field_name: &str,
) -> Result<UploadedFile, ApiError> {
    let mut multipart = Multipart::from_request(request, &()).await.map_err(|e| {
        warn!("Failed to process multipart request: {}", e);
        invalid_upload()
    })?;

    let mut ignored_fields = 0;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Failed to process multipart field: {}", e);
        invalid_upload()
    })? {
        let file_name = match (field.name(), field.file_name()) {
            (Some(name), Some(file_name)) if name == field_name => file_name.to_string(),
            _ => {
                debug!("Ignoring multipart field: {}", field.name().unwrap_or("unnamed"));
                ignored_fields += 1;
                continue;
            }
        };

        debug!(
            "Received file {:?} with declared content type {:?}",
            file_name,
            field.content_type()
        );

        let data = field.bytes().await.map_err(|e| {
            warn!("Failed to read file data: {}", e);
            invalid_upload()
        })?;

        return Ok(UploadedFile { file_name, data });
    }

    if ignored_fields > 0 {
        debug!(
            "Ignored {} fields in multipart request without a '{}' file",
            ignored_fields, field_name
        );
    }

    Err(invalid_upload())
}

// Looks up a form value in the request body (urlencoded or multipart),
// then in the query string
pub async fn extract_form_field(
    request: Request,
    field_name: &str,
) -> Result<Option<String>, ApiError> {
    let query_value = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(pairs)| find_value(pairs, field_name));

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body_value = if content_type.starts_with("multipart/form-data") {
        extract_multipart_text(request, field_name).await?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid form body: {}", e)))?;
        find_value(pairs, field_name)
    } else {
        None
    };

    Ok(body_value.or(query_value))
}

async fn extract_multipart_text(
    request: Request,
    field_name: &str,
) -> Result<Option<String>, ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to process multipart request: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to process multipart field: {}", e)))?
    {
        if field.name() == Some(field_name) && field.file_name().is_none() {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read form field: {}", e)))?;
            return Ok(Some(text));
        }
    }

    Ok(None)
}

fn find_value(pairs: Vec<(String, String)>, field_name: &str) -> Option<String> {
    pairs
        .into_iter()
        .find(|(key, _)| key == field_name)
        .map(|(_, value)| value)
}

fn invalid_upload() -> ApiError {
    ApiError::BadRequest("Invalid file upload".to_string())
}
