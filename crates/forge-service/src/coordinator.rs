//! # Build Coordinator
//!
//! Orchestrates one build request end to end: resolve the core and every
//! extension against the catalog, fingerprint the resolved inputs, take the
//! per-fingerprint lock, answer from the store when possible, otherwise
//! compile through the Foundry and publish the result.
//!
//! Two coordinators sharing a store coordinate optimistically: both may
//! compile, one put wins, and the loser recovers from the duplicate error
//! by re-reading the winner's object.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use forge_catalog::{Catalog, CatalogError};
use forge_core::{
    artifact_id, Artifact, BuildService, Dependency, ErrorKind, ForgeError, Module,
    K6_DEPENDENCY, K6_MODULE_PATH,
};
use forge_foundry::{Foundry, Platform};
use forge_store::{ObjectStore, StoreError};

use crate::locks::ArtifactLock;

/// Detects the build-metadata constraint form `[op]vM.m.p[+-]<tag>`.
static BUILD_SEMVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<operator>[=~^<>!]{1,2})?\s*(?P<version>[vV](?:0|[1-9]\d*)\.(?:0|[1-9]\d*)\.(?:0|[1-9]\d*))[+-](?P<build>[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)",
    )
    .expect("build-semver regex compiles")
});

/// The build coordinator. Stateless apart from the lock table; safe to
/// share behind an `Arc` across request tasks.
pub struct BuildCoordinator {
    catalog: Arc<dyn Catalog>,
    foundry: Arc<dyn Foundry>,
    store: Arc<dyn ObjectStore>,
    locks: Arc<dyn ArtifactLock>,
    allow_build_semvers: bool,
}

impl BuildCoordinator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        foundry: Arc<dyn Foundry>,
        store: Arc<dyn ObjectStore>,
        locks: Arc<dyn ArtifactLock>,
        allow_build_semvers: bool,
    ) -> Self {
        Self {
            catalog,
            foundry,
            store,
            locks,
            allow_build_semvers,
        }
    }

    /// Resolve the core module for the request. Build-metadata constraints
    /// bypass the catalog; everything else goes through it.
    async fn resolve_core(
        &self,
        k6_constraints: &str,
    ) -> Result<(Module, Option<String>), ForgeError> {
        if let Some(tag) = build_semver_tag(k6_constraints)? {
            if !self.allow_build_semvers {
                return Err(ForgeError::wrap(
                    ErrorKind::InvalidParameters,
                    "build versions are not allowed",
                ));
            }
            let module = Module {
                path: K6_MODULE_PATH.to_string(),
                version: format!("v0.0.0+{tag}"),
            };
            return Ok((module, Some(tag)));
        }

        let module = self
            .catalog
            .resolve(&Dependency::new(K6_DEPENDENCY, k6_constraints))
            .await
            .map_err(classify_catalog)?;
        Ok((module, None))
    }

    /// Resolve every extension in order, filling `resolved` and collecting
    /// the modules to hand the Foundry.
    async fn resolve_extensions(
        &self,
        deps: &[Dependency],
        resolved: &mut BTreeMap<String, String>,
    ) -> Result<Vec<Module>, ForgeError> {
        let mut modules = Vec::with_capacity(deps.len());
        for dep in deps {
            let module = self.catalog.resolve(dep).await.map_err(classify_catalog)?;
            resolved.insert(dep.name.clone(), module.version.clone());
            modules.push(module);
        }
        Ok(modules)
    }
}

#[async_trait]
impl BuildService for BuildCoordinator {
    async fn build(
        &self,
        platform: &str,
        k6_constraints: &str,
        dependencies: Vec<Dependency>,
    ) -> Result<Artifact, ForgeError> {
        let platform: Platform = platform
            .parse()
            .map_err(|e| ForgeError::wrap(ErrorKind::InvalidParameters, e))?;

        // Sorting establishes fingerprint idempotence across request
        // orderings.
        let mut deps = dependencies;
        deps.sort_by(|a, b| a.name.cmp(&b.name));

        let mut resolved = BTreeMap::new();
        let (core, build_tag) = self.resolve_core(k6_constraints).await?;
        resolved.insert(K6_DEPENDENCY.to_string(), core.version.clone());
        let modules = self.resolve_extensions(&deps, &mut resolved).await?;

        let id = artifact_id(&platform.to_string(), &core.version, &deps, &resolved);

        let _guard = self
            .locks
            .acquire(&id)
            .await
            .map_err(|e| ForgeError::wrap(ErrorKind::AccessingArtifact, e))?;

        match self.store.get(&id).await {
            Ok(object) => {
                tracing::debug!(%id, "artifact served from store");
                return Ok(assemble(id, object, resolved, &platform));
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(ForgeError::wrap(ErrorKind::AccessingArtifact, e)),
        }

        tracing::info!(%id, %platform, core = %core.version, "building artifact");
        let mut binary = Vec::new();
        // A build-metadata core compiles from the raw tag; the catalog path
        // compiles from the resolved version.
        let compile_version = build_tag.as_deref().unwrap_or(&core.version);
        let build_info = self
            .foundry
            .build(&platform, compile_version, &modules, &[], &mut binary)
            .await
            .map_err(|e| ForgeError::wrap(ErrorKind::BuildingArtifact, e))?;

        // The build-metadata form only pins an upstream revision; the
        // Foundry reports the version it actually compiled.
        if build_tag.is_some() {
            if let Some(actual) = build_info.module_versions.get(&core.path) {
                resolved.insert(K6_DEPENDENCY.to_string(), actual.clone());
            }
        }

        let object = match self.store.put(&id, &binary).await {
            Ok(object) => object,
            Err(StoreError::Duplicate(_)) => {
                // Another builder published first; its object is the
                // artifact.
                tracing::debug!(%id, "lost publish race, reusing peer object");
                self.store
                    .get(&id)
                    .await
                    .map_err(|e| ForgeError::wrap(ErrorKind::AccessingArtifact, e))?
            }
            Err(e) => return Err(ForgeError::wrap(ErrorKind::AccessingArtifact, e)),
        };

        Ok(assemble(id, object, resolved, &platform))
    }

    async fn resolve(
        &self,
        k6_constraints: &str,
        dependencies: Vec<Dependency>,
    ) -> Result<BTreeMap<String, String>, ForgeError> {
        let mut deps = dependencies;
        deps.sort_by(|a, b| a.name.cmp(&b.name));

        let mut resolved = BTreeMap::new();
        let (core, _) = self.resolve_core(k6_constraints).await?;
        resolved.insert(K6_DEPENDENCY.to_string(), core.version);
        self.resolve_extensions(&deps, &mut resolved).await?;
        Ok(resolved)
    }
}

fn assemble(
    id: String,
    object: forge_store::Object,
    resolved: BTreeMap<String, String>,
    platform: &Platform,
) -> Artifact {
    Artifact {
        id,
        url: object.url,
        dependencies: resolved,
        platform: platform.to_string(),
        checksum: object.checksum,
    }
}

fn classify_catalog(err: CatalogError) -> ForgeError {
    match &err {
        CatalogError::InvalidConstraint(_) => {
            ForgeError::wrap(ErrorKind::InvalidParameters, err)
        }
        _ => ForgeError::wrap(ErrorKind::CannotSatisfy, err),
    }
}

/// Extract the build tag from a build-metadata constraint
/// (`v0.0.0+<tag>`, operator absent or `=`). Returns `None` for ordinary
/// constraints and an invalid-parameters error for build-metadata forms
/// with a different operator or base version.
fn build_semver_tag(constraint: &str) -> Result<Option<String>, ForgeError> {
    let Some(captures) = BUILD_SEMVER_RE.captures(constraint) else {
        return Ok(None);
    };

    let operator = captures.name("operator").map_or("", |m| m.as_str());
    if !operator.is_empty() && operator != "=" {
        return Err(ForgeError::wrap(
            ErrorKind::InvalidParameters,
            "only exact match is allowed for build versions",
        ));
    }

    let version = &captures["version"];
    if version != "v0.0.0" {
        return Err(ForgeError::wrap(
            ErrorKind::InvalidParameters,
            "build version must start with v0.0.0",
        ));
    }

    Ok(Some(captures["build"].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_constraints_are_not_build_semvers() {
        assert_eq!(build_semver_tag("v0.1.0").unwrap(), None);
        assert_eq!(build_semver_tag(">v0.8.0").unwrap(), None);
        assert_eq!(build_semver_tag("*").unwrap(), None);
        assert_eq!(build_semver_tag("").unwrap(), None);
    }

    #[test]
    fn build_metadata_is_detected() {
        assert_eq!(
            build_semver_tag("v0.0.0+abc123").unwrap(),
            Some("abc123".to_string())
        );
        assert_eq!(
            build_semver_tag("=v0.0.0+abc123").unwrap(),
            Some("abc123".to_string())
        );
        // The hyphen form is accepted too.
        assert_eq!(
            build_semver_tag("v0.0.0-effa45f").unwrap(),
            Some("effa45f".to_string())
        );
        assert_eq!(
            build_semver_tag("v0.0.0+build-effa45f").unwrap(),
            Some("build-effa45f".to_string())
        );
    }

    #[test]
    fn non_exact_operator_is_rejected() {
        for expr in [">v0.0.0+abc", ">=v0.0.0+abc", "~v0.0.0+abc", "!=v0.0.0+abc"] {
            let err = build_semver_tag(expr).unwrap_err();
            assert!(err.is(ErrorKind::InvalidParameters), "{expr}: {err}");
        }
    }

    #[test]
    fn non_zero_base_is_rejected() {
        let err = build_semver_tag("v0.1.0+abc123").unwrap_err();
        assert!(err.is(ErrorKind::InvalidParameters));
    }
}
