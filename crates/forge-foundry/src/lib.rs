//! # forge-foundry — Compilation Collaborator
//!
//! The Foundry is the opaque compiler behind the build coordinator: given a
//! target platform, a core version, and a list of extension modules, it
//! produces the binary bytes and a [`BuildInfo`] describing what was
//! actually compiled. The coordinator never looks inside: it supplies
//! inputs and a byte sink, and consumes the report.
//!
//! [`process::ProcessFoundry`] wraps an external toolchain command;
//! deployments point it at whatever builds their binaries.

pub mod platform;
pub mod process;

use async_trait::async_trait;
use thiserror::Error;

use forge_core::{BuildInfo, Module};

pub use platform::{Platform, PlatformError};
pub use process::{ProcessFoundry, ProcessFoundryConfig};

/// Foundry failures. The coordinator wraps these as build errors and
/// preserves the diagnostic for the client.
#[derive(Debug, Error)]
pub enum FoundryError {
    /// The toolchain reported a failure; the string carries its output.
    #[error("{0}")]
    BuildFailed(String),

    /// The toolchain could not be invoked.
    #[error("invoking toolchain: {0}")]
    Io(#[from] std::io::Error),

    /// The sink rejected the binary bytes.
    #[error("writing binary: {0}")]
    Sink(String),
}

/// An opaque compiler producing custom k6 binaries.
#[async_trait]
pub trait Foundry: Send + Sync {
    /// Compile a binary for `platform` embedding the core at
    /// `core_version` plus every module in `modules`, writing the bytes to
    /// `out`. `build_flags` pass through to the toolchain unmodified.
    async fn build(
        &self,
        platform: &Platform,
        core_version: &str,
        modules: &[Module],
        build_flags: &[String],
        out: &mut (dyn std::io::Write + Send),
    ) -> Result<BuildInfo, FoundryError>;
}
