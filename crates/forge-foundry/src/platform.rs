//! # Compilation Targets
//!
//! Canonical `os/arch` platform strings, restricted to the targets the
//! toolchain can actually produce.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform targets supported by the toolchain.
const SUPPORTED: &[(&str, &str)] = &[
    ("darwin", "amd64"),
    ("darwin", "arm64"),
    ("linux", "amd64"),
    ("linux", "arm64"),
    ("windows", "amd64"),
    ("windows", "arm64"),
];

/// The platform string is not `os/arch` or names an unsupported target.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid platform {0:?}")]
pub struct PlatformError(pub String);

/// A compilation target in canonical `os/arch` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((os, arch)) = s.split_once('/') else {
            return Err(PlatformError(s.to_string()));
        };
        if !SUPPORTED.contains(&(os, arch)) {
            return Err(PlatformError(s.to_string()));
        }
        Ok(Self {
            os: os.to_string(),
            arch: arch.to_string(),
        })
    }
}

impl TryFrom<String> for Platform {
    type Error = PlatformError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Platform> for String {
    fn from(p: Platform) -> Self {
        p.to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
