use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Failures of the gallery operations, one variant per caller-visible kind.
///
/// Store-level detail is carried only as a `source` for logging; the
/// `Display` text of the 5xx kinds is generic.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("caller lacks permission for this operation")]
    Forbidden,
    #[error("caller role claims are missing")]
    Unauthorized,
    #[error("photo `{0}` was modified concurrently, retry with fresh state")]
    Conflict(String),
    #[error("storage is unavailable")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("error uploading image")]
    UploadFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("error deleting image")]
    DeleteFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type GalleryResult<T> = Result<T, GalleryError>;

impl GalleryError {
    pub fn status(&self) -> StatusCode {
        match self {
            GalleryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
            GalleryError::Forbidden => StatusCode::FORBIDDEN,
            GalleryError::Unauthorized => StatusCode::UNAUTHORIZED,
            GalleryError::Conflict(_) => StatusCode::CONFLICT,
            GalleryError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GalleryError::UploadFailed(_) | GalleryError::DeleteFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<GalleryError> for AppError {
    fn from(err: GalleryError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            match std::error::Error::source(&err) {
                Some(source) => tracing::error!("{}: {}", err, source),
                None => tracing::error!("{}", err),
            }
        }
        AppError::new(status, err.to_string())
    }
}
