//! `k6forge server` — serve the build API.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use forge_foundry::ProcessFoundryConfig;
use forge_service::{new_build_service, BuildServiceConfig};

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Catalog location: file path or http(s) URL.
    #[arg(long, short = 'c', default_value = "catalog.json")]
    catalog: String,

    /// Directory for the local object store.
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// URL of a remote store service; overrides --store-dir.
    #[arg(long)]
    store_url: Option<String>,

    /// Toolchain wrapper command.
    #[arg(long, default_value = "xk6build")]
    foundry_command: String,

    /// Build environment variable (repeatable).
    #[arg(long, short = 'e', value_parser = crate::parse_env)]
    env: Vec<(String, String)>,

    /// Do not inherit this process' environment in the toolchain.
    #[arg(long)]
    no_copy_env: bool,

    /// Accept v0.0.0+<tag> core constraints that bypass the catalog.
    #[arg(long)]
    allow_build_semvers: bool,

    /// Coordinate with other builders sharing --store-dir via leases.
    #[arg(long)]
    store_leases: bool,

    /// Lease duration in seconds.
    #[arg(long, default_value_t = 300)]
    lease_duration: u64,
}

pub async fn run(args: ServerArgs) -> anyhow::Result<()> {
    let verbose = tracing::enabled!(tracing::Level::DEBUG);
    let service = new_build_service(BuildServiceConfig {
        catalog: args.catalog,
        store_dir: args.store_dir,
        store_url: args.store_url,
        foundry: ProcessFoundryConfig {
            command: args.foundry_command,
            build_env: args.env.into_iter().collect::<HashMap<_, _>>(),
            copy_env: !args.no_copy_env,
            verbose,
        },
        allow_build_semvers: args.allow_build_semvers,
        store_leases: args.store_leases,
        lease_duration: Duration::from_secs(args.lease_duration),
    })
    .await
    .context("assembling the build service")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("build API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, forge_api::app(service).into_make_service())
        .await
        .context("serving the build API")?;
    Ok(())
}
