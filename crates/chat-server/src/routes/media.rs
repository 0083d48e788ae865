//! Image upload route.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use super::Envelope;
use crate::blob::BlobError;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct UploadBody {
    pub url: String,
    pub filename: String,
}

/// Store an uploaded image and return its public URL.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<UploadBody>>> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;

        return save_image(&state, original_name.as_deref(), &bytes).await;
    }

    Err(BlobError::Empty.into())
}

async fn save_image(
    state: &AppState,
    original_name: Option<&str>,
    bytes: &[u8],
) -> Result<Json<Envelope<UploadBody>>> {
    let blob = state.blobs.store(original_name, bytes).await?;
    Ok(Json(Envelope::ok(UploadBody {
        url: blob.url,
        filename: blob.filename,
    })))
}
