//! # Store Service
//!
//! The remote object-store variant: one resource per id with the duplicate
//! precondition on writes, and presign-verified downloads.
//!
//! | Route | Behavior |
//! |-------|----------|
//! | `PUT /store/{id}` | Persist the body; 412 when the id is taken. |
//! | `GET /store/{id}` | Metadata with a fresh presigned download URL; 404 when absent. |
//! | `GET /store/{id}/download?expires&token` | The bytes, if the token verifies; 403 otherwise. |
//!
//! Metadata answers replace the backing store's internal URL with a
//! presigned URL under this service's external base, so clients never see
//! (or reach) the store's own addressing.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use forge_store::presign::Presigner;
use forge_store::{Object, ObjectStore, StoreError};

/// Shared state of the store service.
#[derive(Clone)]
pub struct StoreApiState {
    /// The backing store; typically the local file store.
    pub store: Arc<dyn ObjectStore>,
    /// Signs and verifies download grants.
    pub presigner: Presigner,
    /// External base URL presigned URLs are issued under
    /// (e.g. `http://store.internal:9000`).
    pub base_url: String,
}

impl StoreApiState {
    fn presigned_url(&self, id: &str) -> String {
        let (expires, token) = self.presigner.sign(id);
        format!(
            "{}/store/{id}/download?expires={expires}&token={token}",
            self.base_url.trim_end_matches('/')
        )
    }

    /// The store-side object with its URL swapped for a presigned one.
    fn public(&self, object: Object) -> Object {
        Object {
            url: self.presigned_url(&object.id),
            ..object
        }
    }
}

/// Routes of the store service.
pub fn router(state: StoreApiState) -> Router {
    Router::new()
        .route("/store/{id}", put(put_object).get(get_object))
        .route("/store/{id}/download", get(download_object))
        .with_state(state)
}

async fn put_object(
    State(state): State<StoreApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    match state.store.put(&id, &body).await {
        Ok(object) => {
            tracing::debug!(%id, size = body.len(), "object stored");
            Json(state.public(object)).into_response()
        }
        Err(StoreError::Duplicate(_)) => StatusCode::PRECONDITION_FAILED.into_response(),
        Err(e @ StoreError::InvalidId(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!(%id, error = %e, "storing object failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn get_object(State(state): State<StoreApiState>, Path(id): Path<String>) -> Response {
    match state.store.get(&id).await {
        Ok(object) => Json(state.public(object)).into_response(),
        Err(StoreError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e @ StoreError::InvalidId(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!(%id, error = %e, "object lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadParams {
    expires: i64,
    token: String,
}

async fn download_object(
    State(state): State<StoreApiState>,
    Path(id): Path<String>,
    Query(params): Query<DownloadParams>,
) -> Response {
    if let Err(e) = state.presigner.verify(&id, params.expires, &params.token) {
        tracing::warn!(%id, error = %e, "rejecting download");
        return StatusCode::FORBIDDEN.into_response();
    }

    let object = match state.store.get(&id).await {
        Ok(object) => object,
        Err(StoreError::NotFound(_)) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(%id, error = %e, "object lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match state.store.download(&object).await {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            Body::from_stream(ReaderStream::new(body)),
        )
            .into_response(),
        Err(StoreError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(%id, error = %e, "download failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
