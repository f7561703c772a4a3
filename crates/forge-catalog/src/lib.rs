//! # forge-catalog — Extension Catalog
//!
//! The catalog maps dependency names to an upstream module path and the
//! set of versions the service is willing to build. Content is loaded once
//! at startup, from a JSON file or an HTTP URL, and is immutable for the
//! service lifetime, which is what makes [`Catalog::resolve`] pure and safe
//! for concurrent callers.
//!
//! Document format:
//!
//! ```json
//! {
//!   "k6":       { "module": "go.k6.io/k6", "versions": ["v0.1.0", "v0.2.0"] },
//!   "k6/x/ext": { "module": "github.com/grafana/xk6-ext", "versions": ["v0.1.0"] }
//! }
//! ```

pub mod constraint;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forge_core::{Dependency, Module};

pub use constraint::{parse_version, Constraint, ConstraintError};

/// Catalog resolution failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The dependency name has no catalog entry.
    #[error("unknown dependency: {0}")]
    NotFound(String),

    /// No catalogued version satisfies the constraint.
    #[error("no version of {name} satisfies {constraints:?}")]
    CannotSatisfy { name: String, constraints: String },

    /// The constraint expression could not be parsed.
    #[error(transparent)]
    InvalidConstraint(#[from] ConstraintError),

    /// The catalog document could not be read.
    #[error("reading catalog: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog document could not be fetched.
    #[error("fetching catalog: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The catalog document is not valid JSON of the expected shape.
    #[error("parsing catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Resolve `(name, constraint)` pairs to concrete modules.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve a dependency to its module path and the greatest catalogued
    /// version satisfying the constraint.
    async fn resolve(&self, dependency: &Dependency) -> Result<Module, CatalogError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    module: String,
    versions: Vec<String>,
}

/// Immutable catalog backed by a JSON document.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl JsonCatalog {
    /// Parse a catalog from a JSON document.
    pub fn from_json(document: &str) -> Result<Self, CatalogError> {
        let entries: HashMap<String, CatalogEntry> = serde_json::from_str(document)?;
        Ok(Self { entries })
    }

    /// Read a catalog from a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Fetch a catalog from an HTTP URL.
    pub async fn from_url(url: &str) -> Result<Self, CatalogError> {
        let body = reqwest::get(url).await?.error_for_status()?.text().await?;
        Self::from_json(&body)
    }

    /// Load from `location`: an `http(s)://` URL or a filesystem path.
    pub async fn load(location: &str) -> Result<Self, CatalogError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::from_url(location).await
        } else {
            Self::from_file(location)
        }
    }

    fn resolve_entry(&self, dependency: &Dependency) -> Result<Module, CatalogError> {
        let entry = self
            .entries
            .get(&dependency.name)
            .ok_or_else(|| CatalogError::NotFound(dependency.name.clone()))?;

        let constraint: Constraint = dependency.constraints.parse()?;

        // Among satisfying versions the greatest wins. Versions that do not
        // parse as semver are skipped rather than failing the whole entry.
        let best = entry
            .versions
            .iter()
            .filter_map(|raw| parse_version(raw).ok().map(|parsed| (parsed, raw)))
            .filter(|(parsed, _)| constraint.matches(parsed))
            .max_by(|(a, _), (b, _)| a.cmp_precedence(b));

        match best {
            Some((_, raw)) => Ok(Module {
                path: entry.module.clone(),
                version: raw.clone(),
            }),
            None => Err(CatalogError::CannotSatisfy {
                name: dependency.name.clone(),
                constraints: dependency.constraints.clone(),
            }),
        }
    }
}

#[async_trait]
impl Catalog for JsonCatalog {
    async fn resolve(&self, dependency: &Dependency) -> Result<Module, CatalogError> {
        self.resolve_entry(dependency)
    }
}
