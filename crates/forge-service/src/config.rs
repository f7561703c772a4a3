//! # Service Assembly
//!
//! Deployment-facing configuration and the constructor that turns it into a
//! running coordinator. Every failure here is a configuration-time failure
//! and maps to the `initializing builder` kind.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use forge_catalog::JsonCatalog;
use forge_client::StoreClient;
use forge_core::{BuildService, ErrorKind, ForgeError};
use forge_foundry::{ProcessFoundry, ProcessFoundryConfig};
use forge_store::file::FileStore;
use forge_store::ObjectStore;

use crate::coordinator::BuildCoordinator;
use crate::lease::FileLeaseLock;
use crate::locks::{ArtifactLock, MemoryLock};

/// Configuration for a local build service.
#[derive(Debug, Clone)]
pub struct BuildServiceConfig {
    /// Catalog location: a filesystem path or an `http(s)://` URL.
    pub catalog: String,
    /// Directory for the local object store. Ignored when `store_url` is
    /// set; defaults to a directory under the system temp dir.
    pub store_dir: Option<PathBuf>,
    /// URL of a remote store service. Takes precedence over `store_dir`.
    pub store_url: Option<String>,
    /// Toolchain wrapper settings (command, build env, env inheritance).
    pub foundry: ProcessFoundryConfig,
    /// Accept `v0.0.0+<tag>` core constraints that bypass the catalog.
    pub allow_build_semvers: bool,
    /// Serialize builds across processes sharing `store_dir` with leases
    /// under `<store_dir>/.leases`. Requires a directory store.
    pub store_leases: bool,
    /// Lease lifetime when `store_leases` is on.
    pub lease_duration: Duration,
}

impl Default for BuildServiceConfig {
    fn default() -> Self {
        Self {
            catalog: "catalog.json".to_string(),
            store_dir: None,
            store_url: None,
            foundry: ProcessFoundryConfig::default(),
            allow_build_semvers: false,
            store_leases: false,
            lease_duration: crate::lease::DEFAULT_LEASE_DURATION,
        }
    }
}

/// Build a coordinator from deployment configuration.
pub async fn new_build_service(
    config: BuildServiceConfig,
) -> Result<Arc<dyn BuildService>, ForgeError> {
    let initializing = |e: &dyn std::fmt::Display| {
        ForgeError::wrap(ErrorKind::InitializingBuilder, e.to_string())
    };

    let catalog = JsonCatalog::load(&config.catalog)
        .await
        .map_err(|e| initializing(&e))?;

    let store_dir = config
        .store_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("k6forge").join("store"));

    let store: Arc<dyn ObjectStore> = match &config.store_url {
        Some(url) => Arc::new(StoreClient::new(url.clone())),
        None => Arc::new(FileStore::new(&store_dir).map_err(|e| initializing(&e))?),
    };

    let locks: Arc<dyn ArtifactLock> = if config.store_leases {
        if config.store_url.is_some() {
            return Err(initializing(
                &"store leases require a directory store shared between builders",
            ));
        }
        // Dotted names under the store root are reserved for bookkeeping;
        // artifact ids are hex and can never collide with them.
        Arc::new(
            FileLeaseLock::new(store_dir.join(".leases")).with_duration(config.lease_duration),
        )
    } else {
        Arc::new(MemoryLock::new())
    };

    let foundry = Arc::new(ProcessFoundry::new(config.foundry));

    Ok(Arc::new(BuildCoordinator::new(
        Arc::new(catalog),
        foundry,
        store,
        locks,
        config.allow_build_semvers,
    )))
}
