//! # Toolchain Wrapper
//!
//! Invokes an external toolchain command to perform the actual compilation.
//! The integration contract is narrow: the command receives the target, the
//! core version, the module list and an output path; it writes the binary
//! to that path and prints a JSON [`BuildInfo`] object as the last line of
//! stdout. Environment handling mirrors what build toolchains need in
//! practice: an explicit variable map (proxies, module mirrors) plus a
//! flag for inheriting the parent environment.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use forge_core::{BuildInfo, Module};

use crate::{Foundry, FoundryError, Platform};

/// Configuration for [`ProcessFoundry`].
#[derive(Debug, Clone)]
pub struct ProcessFoundryConfig {
    /// Toolchain command to invoke.
    pub command: String,
    /// Environment variables set for the toolchain. Overrides inherited
    /// variables when `copy_env` is on.
    pub build_env: HashMap<String, String>,
    /// Whether the toolchain inherits this process' environment.
    pub copy_env: bool,
    /// Mirror the toolchain's stderr to this process for debugging.
    pub verbose: bool,
}

impl Default for ProcessFoundryConfig {
    fn default() -> Self {
        Self {
            command: "xk6build".to_string(),
            build_env: HashMap::new(),
            copy_env: true,
            verbose: false,
        }
    }
}

/// Foundry backed by an external toolchain command.
#[derive(Debug, Clone)]
pub struct ProcessFoundry {
    config: ProcessFoundryConfig,
}

impl ProcessFoundry {
    pub fn new(config: ProcessFoundryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Foundry for ProcessFoundry {
    async fn build(
        &self,
        platform: &Platform,
        core_version: &str,
        modules: &[Module],
        build_flags: &[String],
        out: &mut (dyn std::io::Write + Send),
    ) -> Result<BuildInfo, FoundryError> {
        let workdir = tempfile::tempdir()?;
        let binary_path = workdir.path().join("k6");

        let mut command = Command::new(&self.config.command);
        command
            .arg("build")
            .arg("--platform")
            .arg(platform.to_string())
            .arg("--k6-version")
            .arg(core_version)
            .arg("--output")
            .arg(&binary_path);
        for module in modules {
            command
                .arg("--with")
                .arg(format!("{}@{}", module.path, module.version));
        }
        command.args(build_flags);

        if !self.config.copy_env {
            command.env_clear();
        }
        command.envs(&self.config.build_env);

        command.stdin(Stdio::null()).stdout(Stdio::piped());
        if self.config.verbose {
            command.stderr(Stdio::inherit());
        } else {
            command.stderr(Stdio::piped());
        }

        tracing::debug!(
            toolchain = %self.config.command,
            %platform,
            core = core_version,
            modules = modules.len(),
            "invoking toolchain"
        );

        let output = command.output().await?;
        if !output.status.success() {
            let mut diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if diagnostic.is_empty() {
                diagnostic = format!("toolchain exited with {}", output.status);
            }
            return Err(FoundryError::BuildFailed(diagnostic));
        }

        let binary = tokio::fs::read(&binary_path).await.map_err(|e| {
            FoundryError::BuildFailed(format!("toolchain produced no binary: {e}"))
        })?;
        out.write_all(&binary)
            .map_err(|e| FoundryError::Sink(e.to_string()))?;

        Ok(self.build_info(&output.stdout, platform, core_version, modules))
    }
}

impl ProcessFoundry {
    /// The report is the last stdout line. A toolchain that prints none gets
    /// a report synthesized from the requested inputs, which is sufficient
    /// for every build that did not use a build-metadata core version.
    fn build_info(
        &self,
        stdout: &[u8],
        platform: &Platform,
        core_version: &str,
        modules: &[Module],
    ) -> BuildInfo {
        let reported = String::from_utf8_lossy(stdout)
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| serde_json::from_str::<BuildInfo>(line.trim()).ok());

        reported.unwrap_or_else(|| {
            let mut module_versions: std::collections::BTreeMap<String, String> = modules
                .iter()
                .map(|m| (m.path.clone(), m.version.clone()))
                .collect();
            module_versions.insert(forge_core::K6_MODULE_PATH.to_string(), core_version.to_string());
            BuildInfo {
                platform: platform.to_string(),
                module_versions,
            }
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// Install a fake toolchain script and return its path.
    fn fake_toolchain(dir: &Path, script: &str) -> String {
        let path = dir.join("fake-toolchain");
        std::fs::write(&path, format!("#!/bin/sh\n{script}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn foundry(command: String) -> ProcessFoundry {
        ProcessFoundry::new(ProcessFoundryConfig {
            command,
            copy_env: true,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn collects_binary_and_report() {
        let dir = tempfile::tempdir().unwrap();
        // Finds `--output <path>`, writes the binary there, reports what it
        // built on the last stdout line.
        let command = fake_toolchain(
            dir.path(),
            r#"
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done
printf 'fake binary' > "$out"
echo '{"platform":"linux/amd64","module_versions":{"go.k6.io/k6":"v0.54.1-0.20241022"}}'
"#,
        );

        let platform: Platform = "linux/amd64".parse().unwrap();
        let mut binary = Vec::new();
        let info = foundry(command)
            .build(&platform, "abc123", &[], &[], &mut binary)
            .await
            .unwrap();

        assert_eq!(binary, b"fake binary");
        assert_eq!(
            info.module_versions.get("go.k6.io/k6").unwrap(),
            "v0.54.1-0.20241022"
        );
    }

    #[tokio::test]
    async fn failure_carries_the_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let command = fake_toolchain(dir.path(), "echo 'module does not compile' >&2; exit 1");

        let platform: Platform = "linux/amd64".parse().unwrap();
        let mut binary = Vec::new();
        let err = foundry(command)
            .build(&platform, "v0.1.0", &[], &[], &mut binary)
            .await
            .unwrap_err();

        match err {
            FoundryError::BuildFailed(diag) => assert!(diag.contains("module does not compile")),
            other => panic!("expected BuildFailed, got {other:?}"),
        }
        assert!(binary.is_empty());
    }

    #[tokio::test]
    async fn missing_report_falls_back_to_requested_versions() {
        let dir = tempfile::tempdir().unwrap();
        let command = fake_toolchain(
            dir.path(),
            r#"
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done
printf 'bin' > "$out"
"#,
        );

        let platform: Platform = "linux/amd64".parse().unwrap();
        let modules = vec![Module {
            path: "github.com/grafana/xk6-ext".into(),
            version: "v0.2.0".into(),
        }];
        let mut binary = Vec::new();
        let info = foundry(command)
            .build(&platform, "v0.1.0", &modules, &[], &mut binary)
            .await
            .unwrap();

        assert_eq!(info.module_versions.get("go.k6.io/k6").unwrap(), "v0.1.0");
        assert_eq!(
            info.module_versions
                .get("github.com/grafana/xk6-ext")
                .unwrap(),
            "v0.2.0"
        );
    }

    #[tokio::test]
    async fn build_env_reaches_the_toolchain() {
        let dir = tempfile::tempdir().unwrap();
        let command = fake_toolchain(
            dir.path(),
            r#"
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done
printf '%s' "$GOPROXY" > "$out"
"#,
        );

        let foundry = ProcessFoundry::new(ProcessFoundryConfig {
            command,
            build_env: HashMap::from([("GOPROXY".to_string(), "https://proxy.internal".to_string())]),
            copy_env: false,
            verbose: false,
        });

        let platform: Platform = "linux/amd64".parse().unwrap();
        let mut binary = Vec::new();
        foundry
            .build(&platform, "v0.1.0", &[], &[], &mut binary)
            .await
            .unwrap();
        assert_eq!(binary, b"https://proxy.internal");
    }
}
