//! # forge-core — Domain Types for the k6forge Build Service
//!
//! Shared vocabulary of the build service: request-side [`Dependency`],
//! catalog-side [`Module`], the published [`Artifact`], the Foundry's
//! [`BuildInfo`], the [`BuildService`] interface, the recursive
//! [`ForgeError`] envelope, and the deterministic artifact fingerprint.
//!
//! Everything here is either a wire type (serde-round-trippable) or a pure
//! function; no I/O happens in this crate.

pub mod api;
pub mod artifact;
pub mod error;
pub mod fingerprint;
pub mod service;

pub use artifact::{Artifact, BuildInfo, Dependency, Module};
pub use error::{ErrorKind, ForgeError};
pub use fingerprint::artifact_id;
pub use service::BuildService;

/// Name under which the k6 core appears in requests and resolved maps.
pub const K6_DEPENDENCY: &str = "k6";

/// Canonical upstream module path of the k6 core.
pub const K6_MODULE_PATH: &str = "go.k6.io/k6";
