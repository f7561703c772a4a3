//! # forge-store — Content-Addressed Object Store
//!
//! Append-only persistence for built binaries, keyed by artifact id. The
//! [`ObjectStore`] interface has three capabilities (`put`, `get`,
//! `download`) and two implementations: the local [`file::FileStore`] in
//! this crate and the HTTP client in `forge-client` speaking to the store
//! service.
//!
//! Duplicate insertion fails distinctly ([`StoreError::Duplicate`]) so that
//! concurrent writers racing on the same id, possibly from different
//! processes, can detect they lost and recover by re-reading.

pub mod file;
pub mod presign;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-side view of an artifact's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// Artifact id the bytes are stored under.
    pub id: String,
    /// SHA-256 (lowercase hex) of the body.
    pub checksum: String,
    /// Handle from which the body can be streamed.
    pub url: String,
}

/// Object store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object is stored under this id.
    #[error("object not found: {0}")]
    NotFound(String),

    /// An object is already stored under this id.
    #[error("object already exists: {0}")]
    Duplicate(String),

    /// The id is empty, contains a path separator, or is a relative
    /// component.
    #[error("invalid object id: {0:?}")]
    InvalidId(String),

    /// The object URL cannot be used by this store.
    #[error("invalid object URL: {0}")]
    InvalidUrl(String),

    /// Failure while persisting a new object.
    #[error("creating object: {0}")]
    Creating(String),

    /// Failure while reading an object or its metadata.
    #[error("accessing object: {0}")]
    Accessing(String),

    /// The store could not be constructed.
    #[error("initializing store: {0}")]
    Initializing(String),
}

/// Streamed object body. The caller drops it to close.
pub type ObjectBody = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Content-addressed persistence: at most one object per id, checksummed
/// with SHA-256, downloadable through a collaborator-provided URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist `content` under `id`. Atomic: either the object becomes
    /// fully visible with a matching checksum or nothing is stored.
    /// Fails with [`StoreError::Duplicate`] when the id is taken.
    async fn put(&self, id: &str, content: &[u8]) -> Result<Object, StoreError>;

    /// Look up the metadata stored under `id` without touching the body.
    async fn get(&self, id: &str) -> Result<Object, StoreError>;

    /// Open the body referenced by an object's URL.
    async fn download(&self, object: &Object) -> Result<ObjectBody, StoreError>;
}

/// Reject ids that could escape the store namespace: empty strings, path
/// separators, and relative components.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id == "." || id == ".." || id.contains('/') || id.contains('\\') {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_ids_pass() {
        validate_id("4f3d").unwrap();
        validate_id("a-b_c.d").unwrap();
    }

    #[test]
    fn hostile_ids_are_rejected() {
        for id in ["", ".", "..", "a/b", "..\\b", "x/../y"] {
            assert!(
                matches!(validate_id(id), Err(StoreError::InvalidId(_))),
                "id {id:?} must be rejected"
            );
        }
    }
}
