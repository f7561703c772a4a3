//! # Artifact Fingerprint
//!
//! Derives the deterministic artifact id from the build inputs. The id is a
//! deduplication key shared by every coordinator writing to the same store,
//! so the serialisation below is byte-exact by contract: every deployed
//! store already keys its artifacts by this exact rendering, including the
//! brace-wrapped dependency pair, and changing it strands all of them.
//!
//! SHA-1 is deliberate. The id is not a security boundary and compatibility
//! with existing stores depends on the exact digest.

use std::collections::BTreeMap;

use sha1::{Digest, Sha1};

use crate::artifact::Dependency;

/// Compute the artifact id for a build.
///
/// `deps` must already be sorted ascending by name and `resolved` must hold
/// a version for each of them; the coordinator establishes both before
/// calling. The hash input is `platform`, then `:k6<core_version>`, then
/// `:{<name> <constraints>}<resolved_version>` per dependency.
pub fn artifact_id(
    platform: &str,
    core_version: &str,
    deps: &[Dependency],
    resolved: &BTreeMap<String, String>,
) -> String {
    let mut input = String::new();
    input.push_str(platform);
    input.push_str(":k6");
    input.push_str(core_version);
    for dep in deps {
        let version = resolved.get(&dep.name).map(String::as_str).unwrap_or("");
        input.push_str(&format!(":{{{} {}}}{version}", dep.name, dep.constraints));
    }
    hex::encode(Sha1::digest(input.as_bytes()))
}
