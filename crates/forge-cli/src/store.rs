//! `k6forge store` — serve the store service over a local directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use forge_api::StoreApiState;
use forge_store::file::FileStore;
use forge_store::presign::Presigner;

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Port to listen on.
    #[arg(long, default_value_t = 9000)]
    port: u16,

    /// Store directory.
    #[arg(long, short = 'd')]
    dir: Option<PathBuf>,

    /// External base URL presigned download URLs are issued under.
    /// Defaults to http://localhost:<port>.
    #[arg(long)]
    base_url: Option<String>,

    /// Secret for presigned download tokens. Falls back to the
    /// K6FORGE_STORE_SECRET environment variable, then to a random
    /// per-process secret (which invalidates URLs across restarts).
    #[arg(long)]
    secret: Option<String>,

    /// Presigned URL lifetime in hours.
    #[arg(long, default_value_t = 24)]
    url_expiration: u64,
}

pub async fn run(args: StoreArgs) -> anyhow::Result<()> {
    let dir = args
        .dir
        .unwrap_or_else(|| std::env::temp_dir().join("k6forge").join("store"));
    let store = FileStore::new(&dir)
        .with_context(|| format!("opening store at {}", dir.display()))?;

    let secret = args
        .secret
        .or_else(|| std::env::var("K6FORGE_STORE_SECRET").ok())
        .unwrap_or_else(|| {
            tracing::warn!("no store secret configured, presigned URLs die with this process");
            uuid::Uuid::new_v4().to_string()
        });

    let base_url = args
        .base_url
        .unwrap_or_else(|| format!("http://localhost:{}", args.port));

    let state = StoreApiState {
        store: Arc::new(store),
        presigner: Presigner::new(secret, Duration::from_secs(args.url_expiration * 60 * 60)),
        base_url,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("store service listening on {addr}, store at {}", dir.display());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, forge_api::store_app(state).into_make_service())
        .await
        .context("serving the store service")?;
    Ok(())
}
