//! `k6forge resolve` — print the resolved dependency map without building.

use anyhow::Context;
use clap::Args;

use forge_catalog::{Catalog, JsonCatalog};
use forge_client::BuildServiceClient;
use forge_core::{BuildService, Dependency, K6_DEPENDENCY};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Constraint for the k6 core.
    #[arg(long, short = 'k', default_value = "*")]
    k6: String,

    /// Dependency as name:constraint (repeatable).
    #[arg(long, short = 'd', value_parser = crate::parse_dependency)]
    dependency: Vec<Dependency>,

    /// Remote build service URL. When absent, resolution runs against the
    /// local catalog.
    #[arg(long, short = 's')]
    server: Option<String>,

    /// Catalog location for local resolution.
    #[arg(long, short = 'c', default_value = "catalog.json")]
    catalog: String,
}

pub async fn run(args: ResolveArgs) -> anyhow::Result<()> {
    let resolved = match &args.server {
        Some(server) => BuildServiceClient::new(server.clone())
            .resolve(&args.k6, args.dependency.clone())
            .await
            .context("resolving against the build service")?,
        None => {
            let catalog = JsonCatalog::load(&args.catalog)
                .await
                .with_context(|| format!("loading catalog {}", args.catalog))?;

            let mut resolved = std::collections::BTreeMap::new();
            let core = catalog
                .resolve(&Dependency::new(K6_DEPENDENCY, &args.k6))
                .await
                .context("resolving k6")?;
            resolved.insert(K6_DEPENDENCY.to_string(), core.version);
            for dep in &args.dependency {
                let module = catalog
                    .resolve(dep)
                    .await
                    .with_context(|| format!("resolving {}", dep.name))?;
                resolved.insert(dep.name.clone(), module.version);
            }
            resolved
        }
    };

    for (name, version) in &resolved {
        println!("{name}:{version:?}");
    }
    Ok(())
}
