//! Defines routes for the gallery API.
//!
//! ## Structure
//! - **Gallery endpoints** (role claims required)
//!   - `GET    /API/getImages`         — list visible photos with signed URLs
//!   - `POST   /API/uploadImages`      — upload a base64 image (admin); its
//!     body limit is scaled for base64 so the image limit matches the raw route
//!   - `POST   /API/uploadImages/raw`  — upload a raw image body (admin)
//!   - `PATCH  /API/updateImages`      — toggle visibility (admin)
//!   - `DELETE /API/deleteImages`      — delete a photo (admin)
//!
//! - **Blob endpoint** (signature required)
//!   - `GET    /blobs/{key}`           — read one object through a signed URL

use crate::{
    app_state::AppState,
    config::AppConfig,
    handlers::{
        blob_handlers::get_blob,
        health_handlers::{healthz, readyz},
        photo_handlers::{
            delete_image, list_images, toggle_visibility, upload_image, upload_image_raw,
        },
    },
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, patch, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Room for the JSON envelope, data-URL header and title/description around
/// the base64 image.
const JSON_ENVELOPE_SLACK: usize = 64 * 1024;

/// Body limit for the base64 JSON upload, sized so an image of
/// `max_upload_bytes` still fits once encoded.
pub fn json_upload_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(JSON_ENVELOPE_SLACK)
}

/// Build the router for all gallery routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/API/getImages", get(list_images))
        .route(
            "/API/uploadImages",
            post(upload_image).layer(DefaultBodyLimit::max(json_upload_limit(max_upload_bytes))),
        )
        .route("/API/uploadImages/raw", post(upload_image_raw))
        .route("/API/updateImages", patch(toggle_visibility))
        .route("/API/deleteImages", delete(delete_image))
        .route("/blobs/{key}", get(get_blob))
}

/// Full application: routes, state and the cross-cutting layers.
pub fn app(state: AppState, cfg: &AppConfig) -> Router {
    routes(cfg.max_upload_bytes)
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes))
        .layer(cors_layer(&cfg.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any header and any method are always allowed; origins are restricted
/// only when a list is configured.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring malformed CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
