//! # Artifact Vocabulary
//!
//! Request-side dependencies, catalog-side modules, and the published
//! artifact descriptor. All of these are immutable values once constructed
//! and serialize directly onto the wire format.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A requested dependency: a catalog key plus a version constraint
/// expression (`*`, `v0.1.0`, `>v0.8.0`, `v0.0.0+deadbeef`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Catalog key the constraint applies to. Opaque to the coordinator.
    pub name: String,
    /// Version constraint expression.
    #[serde(default)]
    pub constraints: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, constraints: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: constraints.into(),
        }
    }
}

/// Compact rendering for log lines; the fingerprint has its own
/// serialisation (see [`crate::fingerprint`]).
impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.constraints)
    }
}

/// A concrete module resolved from the catalog: the upstream source path
/// and an exact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Upstream identifier of the source to compile.
    pub path: String,
    /// Concrete semantic version, `v`-prefixed (e.g. `v0.2.0`).
    pub version: String,
}

/// A fully-described compiled binary plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artifact {
    /// Deterministic fingerprint of the build inputs (lowercase hex).
    pub id: String,
    /// Download handle for the binary, supplied by the object store.
    pub url: String,
    /// Resolved version for every requested name plus the k6 core.
    pub dependencies: BTreeMap<String, String>,
    /// Target platform in canonical `os/arch` form.
    pub platform: String,
    /// SHA-256 (lowercase hex) of the binary.
    pub checksum: String,
}

impl Artifact {
    /// Multi-line rendering with every field, for verbose CLI output.
    pub fn print(&self) -> String {
        self.render(true, "\n")
    }

    /// Multi-line rendering without id and url.
    pub fn print_summary(&self) -> String {
        self.render(false, "\n")
    }

    fn render(&self, details: bool, sep: &str) -> String {
        let mut out = String::new();
        if details {
            out.push_str(&format!("id: {}{sep}", self.id));
        }
        out.push_str(&format!("platform: {}{sep}", self.platform));
        for (dep, version) in &self.dependencies {
            out.push_str(&format!("{dep}:{version:?}{sep}"));
        }
        out.push_str(&format!("checksum: {}{sep}", self.checksum));
        if details {
            out.push_str(&format!("url: {}{sep}", self.url));
        }
        out
    }
}

/// Single-line rendering for log lines.
impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true, " "))
    }
}

/// What the Foundry actually compiled. Only consulted when the core was
/// resolved from a build-metadata constraint, in which case the reported
/// core version replaces the requested one in the artifact's dependency map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Platform the binary was produced for.
    pub platform: String,
    /// Actually-built version per module path.
    pub module_versions: BTreeMap<String, String>,
}
