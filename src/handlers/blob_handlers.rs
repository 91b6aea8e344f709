//! Signed blob reads.
//!
//! `GET /blobs/{key}?expires=&signature=` streams the object. The signature
//! is the only authorization; no role claims are consulted.

use crate::{
    app_state::AppState, errors::AppError, services::upload_pipeline::ImageKind,
    stores::blob_store::BlobError,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct SignedReadQuery {
    pub expires: i64,
    pub signature: String,
}

pub async fn get_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<SignedReadQuery>,
) -> Result<Response, AppError> {
    state
        .blobs
        .verify_signed_read(&key, q.expires, &q.signature)
        .map_err(blob_error)?;

    let reader = state.blobs.open(&key).await.map_err(blob_error)?;
    let mut response = Response::new(Body::from_stream(ReaderStream::new(reader)));
    let content_type = ImageKind::from_key(&key)
        .map(ImageKind::content_type)
        .unwrap_or("application/octet-stream");
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}

fn blob_error(err: BlobError) -> AppError {
    match err {
        BlobError::InvalidSignature | BlobError::InvalidKey => {
            AppError::new(StatusCode::FORBIDDEN, "signed url is expired or invalid")
        }
        BlobError::NotFound(_) => AppError::not_found("object not found"),
        BlobError::Io(err) => {
            tracing::error!("blob read failed: {}", err);
            AppError::new(StatusCode::SERVICE_UNAVAILABLE, "storage is unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AppConfig, Args},
        stores::blob_store::BlobStore,
        test_support::*,
    };
    use axum::body::to_bytes;
    use std::time::Duration;

    fn state(stores: &TestStores) -> AppState {
        let (cfg, _) = AppConfig::resolve(Args::default(), |_| None).unwrap();
        AppState::new(&cfg, stores.blob_store(), stores.metadata_store())
    }

    fn query_from(url: &str) -> SignedReadQuery {
        let mut expires = 0;
        let mut signature = String::new();
        for pair in url.split_once('?').unwrap().1.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("signature", v) => signature = v.to_string(),
                _ => {}
            }
        }
        SignedReadQuery { expires, signature }
    }

    #[tokio::test]
    async fn signed_url_serves_object_bytes() {
        let stores = TestStores::new().await;
        stores.blobs.seed("a.png", PNG_BYTES).await;
        let url = stores.blobs.signed_read_url("a.png", Duration::from_secs(60));

        let response = get_blob(State(state(&stores)), Path("a.png".into()), Query(query_from(&url)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], PNG_BYTES);
    }

    #[tokio::test]
    async fn tampered_signature_is_forbidden() {
        let stores = TestStores::new().await;
        stores.blobs.seed("a.png", PNG_BYTES).await;
        stores.blobs.seed("b.png", PNG_BYTES).await;
        let url = stores.blobs.signed_read_url("a.png", Duration::from_secs(60));

        let err = get_blob(State(state(&stores)), Path("b.png".into()), Query(query_from(&url)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deleted_object_is_not_found() {
        let stores = TestStores::new().await;
        let url = stores.blobs.signed_read_url("gone.png", Duration::from_secs(60));
        let err = get_blob(State(state(&stores)), Path("gone.png".into()), Query(query_from(&url)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
