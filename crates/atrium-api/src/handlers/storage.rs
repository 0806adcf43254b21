//! Phase one of an upload (store the bytes) and the public media route
//! used by the local backend.

use std::sync::Arc;

use atrium_core::models::{ContentKind, UploadResponse};
use atrium_core::{AppError, MediaLimits};
use atrium_storage::keys::extension;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::{AppState, MediaConfig};

struct UploadedFile {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

/// Read the `kind` and `file` fields. The file is read chunk by chunk so an
/// oversized upload is rejected without buffering all of it.
async fn read_upload(
    mut multipart: Multipart,
    media: &MediaConfig,
) -> Result<(ContentKind, UploadedFile), HttpAppError> {
    let mut kind: Option<ContentKind> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "kind" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read kind: {}", e)))?;
                kind = Some(
                    raw.trim()
                        .parse::<ContentKind>()
                        .map_err(|e| AppError::InvalidInput(e.to_string()))?,
                );
            }
            "file" => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Send exactly one field named 'file'".to_string(),
                    )
                    .into());
                }
                // Fields arrive in order; without a kind yet only the global cap applies.
                let max_size = match kind {
                    Some(k) => media.limits_for(k).max_size_bytes,
                    None => [&media.audio, &media.pdf, &media.video]
                        .iter()
                        .map(|l| l.max_size_bytes)
                        .max()
                        .unwrap_or(0),
                };
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();

                let mut data = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?
                {
                    if data.len() + chunk.len() > max_size {
                        return Err(too_large(max_size).into());
                    }
                    data.extend_from_slice(&chunk);
                }

                file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let kind = kind.ok_or_else(|| AppError::InvalidInput("Missing 'kind' field".to_string()))?;
    let file = file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    Ok((kind, file))
}

fn too_large(max_size: usize) -> AppError {
    AppError::PayloadTooLarge(format!(
        "File size exceeds maximum allowed size of {} MB",
        max_size / 1024 / 1024
    ))
}

/// Check an upload against the limits for its kind.
fn validate_upload(limits: &MediaLimits, file: &UploadedFile) -> Result<(), AppError> {
    if file.data.is_empty() {
        return Err(AppError::InvalidInput("File is empty".to_string()));
    }
    if file.data.len() > limits.max_size_bytes {
        return Err(too_large(limits.max_size_bytes));
    }

    let ext = extension(&file.filename).unwrap_or_default();
    if !limits.allows_extension(&ext) {
        return Err(AppError::InvalidInput(format!(
            "Invalid file extension. Allowed extensions: {}",
            limits.allowed_extensions.join(", ")
        )));
    }
    if !limits.allows_content_type(&file.content_type) {
        return Err(AppError::InvalidInput(format!(
            "Invalid content type. Allowed types: {}",
            limits.allowed_content_types.join(", ")
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/storage/upload",
    tag = "storage",
    request_body(content_type = "multipart/form-data", description = "Fields: `kind` (audio, pdf, video) then `file`"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Invalid file", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    ctx.require_admin()?;

    let (kind, file) = read_upload(multipart, &state.media).await?;
    validate_upload(state.media.limits_for(kind), &file)?;

    let size = file.data.len();
    let (storage_key, file_url) = state
        .media
        .storage
        .upload(kind, &file.filename, &file.content_type, file.data)
        .await?;

    tracing::info!(
        kind = %kind,
        storage_key = %storage_key,
        size = size,
        "File stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_url,
            storage_key,
            content_type: file.content_type,
            size: size as i64,
        }),
    ))
}

/// Best-effort content type for a stored object, from its extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    match extension(key).as_deref() {
        Some("pdf") => "application/pdf",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("flac") => "audio/flac",
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("ogv") => "video/ogg",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Stream a stored object. Public: file URLs handed to renderers must load
/// without a bearer token.
#[tracing::instrument(skip(state), fields(operation = "serve_media"))]
pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, HttpAppError> {
    let stream = state.media.storage.download_stream(&key).await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for_key(&key))
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> MediaLimits {
        MediaLimits {
            max_size_bytes: 16,
            allowed_extensions: vec!["mp3".to_string()],
            allowed_content_types: vec!["audio/mpeg".to_string()],
        }
    }

    fn file(name: &str, content_type: &str, len: usize) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: content_type.to_string(),
            data: vec![0u8; len],
        }
    }

    #[test]
    fn accepts_matching_upload() {
        assert!(validate_upload(&limits(), &file("song.MP3", "audio/mpeg", 8)).is_ok());
    }

    #[test]
    fn rejects_size_extension_and_type() {
        assert!(matches!(
            validate_upload(&limits(), &file("song.mp3", "audio/mpeg", 17)),
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            validate_upload(&limits(), &file("song.mp3", "audio/mpeg", 0)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(validate_upload(&limits(), &file("song.exe", "audio/mpeg", 8)).is_err());
        assert!(validate_upload(&limits(), &file("song.mp3", "text/html", 8)).is_err());
    }

    #[test]
    fn media_content_types() {
        assert_eq!(content_type_for_key("pdf/a.pdf"), "application/pdf");
        assert_eq!(content_type_for_key("video/a.webm"), "video/webm");
        assert_eq!(content_type_for_key("audio/a"), "application/octet-stream");
    }
}
