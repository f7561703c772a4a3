//! # Wire Types
//!
//! Request and response bodies of the build API, shared by the server and
//! the HTTP client so the two cannot drift. The `k6Constrains` field name
//! is the protocol's, kept for compatibility with existing clients.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, Dependency};
use crate::error::ForgeError;

/// Body of `POST /build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Target platform, canonical `os/arch`.
    #[serde(default)]
    pub platform: String,
    /// Constraint for the k6 core.
    #[serde(rename = "k6Constrains", default)]
    pub k6_constraints: String,
    /// Requested extensions.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl fmt::Display for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform: {} k6: {}", self.platform, self.k6_constraints)?;
        for dep in &self.dependencies {
            write!(f, " {}:{:?}", dep.name, dep.constraints)?;
        }
        Ok(())
    }
}

/// Body of a `POST /build` response. At most one field is populated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildResponse {
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub error: Option<ForgeError>,
}

/// Body of a `POST /resolve` response. At most one field is populated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolveResponse {
    #[serde(default)]
    pub resolved: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub error: Option<ForgeError>,
}
