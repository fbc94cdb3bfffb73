use axum::{
    extract::{multipart::Field, Multipart, State},
    response::IntoResponse,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
    storage::{sanitize_upload_path, sniff_image_type, StorageError},
    types::UploadResponse,
};

struct UploadedFile {
    name: String,
    content_type: String,
    bytes: Vec<u8>,
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
}

/// Reads a file field, stopping as soon as it grows past `max_bytes`, and
/// checks that the content really is an image.
async fn read_file(mut field: Field<'_>, max_bytes: usize) -> AppResult<UploadedFile> {
    let name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest("Only image uploads are allowed".to_string()));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(AppError::BadRequest(format!(
                "Image too large (max {} MB)",
                max_bytes / (1024 * 1024)
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    // The declared type is only a hint; the stored type comes from the bytes
    let Some(sniffed) = sniff_image_type(&bytes) else {
        tracing::debug!(declared = %content_type, "Upload content is not a recognized image");
        return Err(AppError::BadRequest("Only image uploads are allowed".to_string()));
    };
    Ok(UploadedFile { name, content_type: sniffed.to_string(), bytes })
}

pub async fn upload_image(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<impl IntoResponse> {
    let Some(storage) = state.storage.clone() else {
        return Err(AppError::BadRequest("Image storage is not configured".to_string()));
    };
    let max_bytes = state.config.storage.max_upload_bytes;

    let mut prefix = String::new();
    let mut file: Option<UploadedFile> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => file = Some(read_file(field, max_bytes).await?),
            Some("prefix") => prefix = field.text().await.map_err(multipart_error)?,
            _ => {}
        }
    }
    let file = file.ok_or_else(|| AppError::BadRequest("Missing image file".to_string()))?;

    let path = sanitize_upload_path(&prefix, &file.name, chrono::Utc::now().timestamp_millis());
    let size = file.bytes.len() as u64;
    let stored = storage.upload(&path, file.bytes, &file.content_type).await.map_err(|e| match e {
        StorageError::Rejected { message, .. } => AppError::Upstream(message),
        other => AppError::Upstream(other.to_string()),
    })?;

    state.metrics.add_upload(size);
    let url = storage.public_url(&stored);
    Ok(Json(UploadResponse { url, path: stored }))
}
