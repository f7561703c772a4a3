//! # Build Service Interface
//!
//! The one interface every front-end talks to. The local coordinator and the
//! HTTP client both implement it, so a caller can swap an in-process build
//! for a remote one without code changes.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::artifact::{Artifact, Dependency};
use crate::error::ForgeError;

/// A service that can produce k6 binaries with custom extension sets.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Build (or fetch from the store) a k6 binary for `platform` with the
    /// core satisfying `k6_constraints` and every dependency satisfied.
    async fn build(
        &self,
        platform: &str,
        k6_constraints: &str,
        dependencies: Vec<Dependency>,
    ) -> Result<Artifact, ForgeError>;

    /// Resolve the core constraint and dependencies without building.
    /// Returns the name → concrete version map the build would embed.
    async fn resolve(
        &self,
        k6_constraints: &str,
        dependencies: Vec<Dependency>,
    ) -> Result<BTreeMap<String, String>, ForgeError>;
}
