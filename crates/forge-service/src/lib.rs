//! # forge-service — The Build Coordinator
//!
//! Wires the catalog, Foundry, object store and per-fingerprint locks into
//! the [`BuildCoordinator`], the component that actually answers build
//! requests. [`config::BuildServiceConfig`] assembles a ready-to-serve
//! coordinator from deployment settings.

pub mod config;
pub mod coordinator;
pub mod lease;
pub mod locks;

pub use config::{new_build_service, BuildServiceConfig};
pub use coordinator::BuildCoordinator;
pub use lease::{FileLeaseLock, DEFAULT_LEASE_DURATION};
pub use locks::{ArtifactLock, LockError, LockGuard, MemoryLock};
