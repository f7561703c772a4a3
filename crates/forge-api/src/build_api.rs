//! # Build API
//!
//! Marshals build requests onto the [`BuildService`] and build results back
//! into the response envelope. Error classification lives entirely in the
//! envelope: a request we could decode always answers 200, whether the
//! build worked or not, so clients switch on the error kind rather than on
//! transport status.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use forge_core::api::{BuildRequest, BuildResponse, ResolveResponse};
use forge_core::{BuildService, ErrorKind, ForgeError};
use forge_foundry::Platform;

#[derive(Clone)]
struct BuildApiState {
    service: Arc<dyn BuildService>,
}

/// Routes of the build API.
pub fn router(service: Arc<dyn BuildService>) -> Router {
    Router::new()
        .route("/build", post(build))
        .route("/resolve", post(resolve))
        .route("/health", get(health))
        .with_state(BuildApiState { service })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn build(
    State(state): State<BuildApiState>,
    payload: Result<Json<BuildRequest>, JsonRejection>,
) -> (StatusCode, Json<BuildResponse>) {
    let request = match decode(payload) {
        Ok(request) => request,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BuildResponse {
                    artifact: None,
                    error: Some(error),
                }),
            );
        }
    };

    tracing::debug!(%request, "processing build request");
    let response = match state
        .service
        .build(
            &request.platform,
            &request.k6_constraints,
            request.dependencies,
        )
        .await
    {
        Ok(artifact) => {
            tracing::debug!(%artifact, "returning artifact");
            BuildResponse {
                artifact: Some(artifact),
                error: None,
            }
        }
        Err(error) => {
            tracing::warn!(%error, "build failed");
            BuildResponse {
                artifact: None,
                error: Some(error),
            }
        }
    };
    (StatusCode::OK, Json(response))
}

async fn resolve(
    State(state): State<BuildApiState>,
    payload: Result<Json<BuildRequest>, JsonRejection>,
) -> (StatusCode, Json<ResolveResponse>) {
    let request = match decode(payload) {
        Ok(request) => request,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ResolveResponse {
                    resolved: None,
                    error: Some(error),
                }),
            );
        }
    };

    // Resolution does not depend on the platform, but a caller that sends
    // one still deserves the validation.
    if !request.platform.is_empty() {
        if let Err(e) = request.platform.parse::<Platform>() {
            return (
                StatusCode::OK,
                Json(ResolveResponse {
                    resolved: None,
                    error: Some(ForgeError::wrap(ErrorKind::InvalidParameters, e)),
                }),
            );
        }
    }

    tracing::debug!(%request, "processing resolve request");
    let response = match state
        .service
        .resolve(&request.k6_constraints, request.dependencies)
        .await
    {
        Ok(resolved) => ResolveResponse {
            resolved: Some(resolved),
            error: None,
        },
        Err(error) => {
            tracing::warn!(%error, "resolve failed");
            ResolveResponse {
                resolved: None,
                error: Some(error),
            }
        }
    };
    (StatusCode::OK, Json(response))
}

fn decode(payload: Result<Json<BuildRequest>, JsonRejection>) -> Result<BuildRequest, ForgeError> {
    match payload {
        Ok(Json(request)) => Ok(request),
        Err(rejection) => {
            tracing::warn!(%rejection, "rejecting undecodable request");
            Err(ForgeError::wrap(ErrorKind::InvalidRequest, rejection))
        }
    }
}
