//! # k6forge CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

mod build;
mod resolve;
mod server;
mod store;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// k6forge — custom k6 binary build service.
#[derive(Parser, Debug)]
#[command(name = "k6forge", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the build API.
    Server(server::ServerArgs),

    /// Serve the store service over a local directory store.
    Store(store::StoreArgs),

    /// Build a custom binary, locally or against a remote build service.
    Build(build::BuildArgs),

    /// Resolve dependency constraints without building.
    Resolve(resolve::ResolveArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Server(args) => server::run(args).await,
        Commands::Store(args) => store::run(args).await,
        Commands::Build(args) => build::run(args).await,
        Commands::Resolve(args) => resolve::run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("k6forge: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Parse a `-d name:constraint` argument; the constraint defaults to `*`.
fn parse_dependency(arg: &str) -> Result<forge_core::Dependency, String> {
    Ok(match arg.split_once(':') {
        Some((name, constraints)) => forge_core::Dependency::new(name, constraints),
        None => forge_core::Dependency::new(arg, "*"),
    })
}

/// Parse a `-e KEY=VALUE` argument.
fn parse_env(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {arg:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_argument_forms() {
        let dep = parse_dependency("k6/x/ext:>v0.1.0").unwrap();
        assert_eq!(dep.name, "k6/x/ext");
        assert_eq!(dep.constraints, ">v0.1.0");

        let dep = parse_dependency("k6/x/ext").unwrap();
        assert_eq!(dep.constraints, "*");
    }

    #[test]
    fn env_argument_forms() {
        assert_eq!(
            parse_env("GOPROXY=https://proxy").unwrap(),
            ("GOPROXY".to_string(), "https://proxy".to_string())
        );
        assert!(parse_env("GOPROXY").is_err());
    }
}
