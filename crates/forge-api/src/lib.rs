//! # forge-api — HTTP Surfaces
//!
//! Two axum routers:
//!
//! - [`build_api`] — the request surface of the build service:
//!   `POST /build`, `POST /resolve`, `GET /health`. Domain failures travel
//!   inside the response envelope with status 200; only an undecodable
//!   request body earns a 400.
//! - [`store_api`] — the store service: content-addressed PUT/GET plus
//!   presign-verified downloads, the remote counterpart of the local file
//!   store.

pub mod build_api;
pub mod store_api;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use forge_core::BuildService;

pub use store_api::StoreApiState;

/// Assemble the build API application.
pub fn app(service: Arc<dyn BuildService>) -> Router {
    build_api::router(service).layer(TraceLayer::new_for_http())
}

/// Assemble the store service application.
pub fn store_app(state: StoreApiState) -> Router {
    store_api::router(state).layer(TraceLayer::new_for_http())
}
