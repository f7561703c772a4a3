//! # forge-client — HTTP Clients
//!
//! Two clients speaking to the k6forge services:
//!
//! - [`BuildServiceClient`] implements the `BuildService` interface against
//!   the build API, so callers swap an in-process coordinator for a remote
//!   one without code changes.
//! - [`StoreClient`] implements the `ObjectStore` interface against the
//!   store service, making a remote store a drop-in for the local one.
//!
//! Transient transport failures are retried under a per-client [`Backoff`]
//! policy; domain errors are never retried.

pub mod build;
pub mod store;

mod retry;

pub use build::BuildServiceClient;
pub use retry::Backoff;
pub use store::StoreClient;
