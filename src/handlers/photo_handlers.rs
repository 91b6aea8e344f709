//! HTTP handlers for the gallery operations.
//! Each handler resolves the caller, delegates to one service and shapes the
//! JSON response; no handler touches a store directly.

use crate::{
    app_state::AppState,
    errors::{AppError, GalleryError},
    handlers::caller::Caller,
    models::photo::PhotoView,
    services::upload_pipeline::UploadDetails,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

/// Body of `POST /API/uploadImages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Base64 image, optionally as a data URL.
    pub image_data: Option<String>,
    #[serde(default)]
    pub metadata: UploadMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl From<UploadMetadata> for UploadDetails {
    fn from(meta: UploadMetadata) -> Self {
        UploadDetails {
            title: meta.title,
            description: meta.description,
        }
    }
}

/// Body of the toggle and delete endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoIdRequest {
    pub photo_id: Option<String>,
}

impl PhotoIdRequest {
    fn require(self) -> Result<String, GalleryError> {
        self.photo_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| GalleryError::InvalidInput("photoId is required".into()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
    pub photo_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub message: String,
    pub photo_id: String,
    pub new_is_public: bool,
}

/// `GET /API/getImages` — photos visible to the caller, with signed URLs.
pub async fn list_images(
    State(state): State<AppState>,
    Caller(gate): Caller,
) -> Result<Json<Vec<PhotoView>>, AppError> {
    Ok(Json(state.gallery.list(&gate).await?))
}

/// `POST /API/uploadImages` — base64 JSON upload.
pub async fn upload_image(
    State(state): State<AppState>,
    Caller(gate): Caller,
    Json(req): Json<UploadRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let image_data = req.image_data.unwrap_or_default();
    let record = state
        .uploads
        .upload_base64(&gate, &image_data, req.metadata.into())
        .await?;
    Ok(Json(uploaded(record.photo_id)))
}

/// `POST /API/uploadImages/raw?title=&description=` — raw image body.
pub async fn upload_image_raw(
    State(state): State<AppState>,
    Caller(gate): Caller,
    Query(meta): Query<UploadMetadata>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let record = state.uploads.upload(&gate, body, meta.into()).await?;
    Ok(Json(uploaded(record.photo_id)))
}

/// `PATCH /API/updateImages` — flip a photo's visibility.
pub async fn toggle_visibility(
    State(state): State<AppState>,
    Caller(gate): Caller,
    Json(req): Json<PhotoIdRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let photo_id = req.require()?;
    let new_is_public = state.visibility.toggle(&gate, &photo_id).await?;
    Ok(Json(ToggleResponse {
        message: format!("Photo {} is Public set to {}", photo_id, new_is_public),
        photo_id,
        new_is_public,
    }))
}

/// `DELETE /API/deleteImages` — remove a photo from both stores.
pub async fn delete_image(
    State(state): State<AppState>,
    Caller(gate): Caller,
    Json(req): Json<PhotoIdRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let photo_id = req.require()?;
    state.deletions.delete(&gate, &photo_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Image photoId={} deleted successfully", photo_id),
        photo_id,
    }))
}

fn uploaded(photo_id: String) -> MessageResponse {
    MessageResponse {
        message: format!("Image:{} upload Successfully", photo_id),
        photo_id,
    }
}
