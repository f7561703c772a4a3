//! `k6forge build` — build a custom binary and optionally download it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tokio::io::AsyncWriteExt;

use forge_client::BuildServiceClient;
use forge_core::{Artifact, BuildService, Dependency};
use forge_foundry::ProcessFoundryConfig;
use forge_service::{new_build_service, BuildServiceConfig};
use forge_store::{Object, ObjectStore};

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Target platform (os/arch).
    #[arg(long, short = 'p')]
    platform: String,

    /// Constraint for the k6 core.
    #[arg(long, short = 'k', default_value = "*")]
    k6: String,

    /// Dependency as name:constraint (repeatable).
    #[arg(long, short = 'd', value_parser = crate::parse_dependency)]
    dependency: Vec<Dependency>,

    /// Remote build service URL. When absent the build runs locally.
    #[arg(long, short = 's')]
    server: Option<String>,

    /// Catalog location for local builds.
    #[arg(long, short = 'c', default_value = "catalog.json")]
    catalog: String,

    /// Store directory for local builds.
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Toolchain wrapper command for local builds.
    #[arg(long, default_value = "xk6build")]
    foundry_command: String,

    /// Build environment variable (repeatable).
    #[arg(long, short = 'e', value_parser = crate::parse_env)]
    env: Vec<(String, String)>,

    /// Accept v0.0.0+<tag> core constraints that bypass the catalog.
    #[arg(long)]
    allow_build_semvers: bool,

    /// Download the built binary to this path.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let store_dir = args
        .store_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("k6forge").join("store"));

    let service: Arc<dyn BuildService> = match &args.server {
        Some(server) => Arc::new(BuildServiceClient::new(server.clone())),
        None => new_build_service(BuildServiceConfig {
            catalog: args.catalog.clone(),
            store_dir: Some(store_dir.clone()),
            store_url: None,
            foundry: ProcessFoundryConfig {
                command: args.foundry_command.clone(),
                build_env: args.env.iter().cloned().collect::<HashMap<_, _>>(),
                copy_env: true,
                verbose: tracing::enabled!(tracing::Level::DEBUG),
            },
            allow_build_semvers: args.allow_build_semvers,
            ..Default::default()
        })
        .await
        .context("assembling the build service")?,
    };

    let artifact = service
        .build(&args.platform, &args.k6, args.dependency.clone())
        .await
        .context("building artifact")?;

    print!("{}", artifact.print());

    if let Some(output) = &args.output {
        download(&artifact, &store_dir, output)
            .await
            .with_context(|| format!("downloading to {}", output.display()))?;
        tracing::info!("binary written to {}", output.display());
    }
    Ok(())
}

/// Fetch the artifact's bytes to `output`. Presigned URLs come straight
/// over HTTP; local builds read back through the file store.
async fn download(artifact: &Artifact, store_dir: &Path, output: &Path) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(output).await?;

    if artifact.url.starts_with("http://") || artifact.url.starts_with("https://") {
        let response = reqwest::get(&artifact.url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        file.write_all(&bytes).await?;
    } else {
        let store = forge_store::file::FileStore::new(store_dir)?;
        let object = Object {
            id: artifact.id.clone(),
            checksum: artifact.checksum.clone(),
            url: artifact.url.clone(),
        };
        let mut body = store.download(&object).await?;
        tokio::io::copy(&mut body, &mut file).await?;
    }
    file.flush().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(output, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}
