//! # Version Constraint Expressions
//!
//! Parser and matcher for the constraint grammar accepted in build requests:
//! `=`, `!=`, `>`, `<`, `>=`, `<=`, `~`, `^`, `*`, and a bare version
//! meaning exact match. Versions may carry the conventional `v` prefix
//! (`>v0.8.0`), which semver proper does not know about.
//!
//! Range evaluation delegates to the `semver` crate; the wrapper exists
//! because the request grammar differs from semver's in three ways: a bare
//! version is an exact match (semver treats it as a caret range), `!=` is
//! accepted, and `v`/`V` prefixes are tolerated.

use std::fmt;
use std::str::FromStr;

use semver::{Comparator, Op as RangeOp, Version, VersionReq};
use thiserror::Error;

/// Constraint parse failure.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid constraint {expression:?}: {detail}")]
pub struct ConstraintError {
    pub expression: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Any,
    Exact,
    NotEqual,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Tilde,
    Caret,
}

/// A parsed constraint expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    raw: String,
    op: Operator,
    version: Option<Version>,
}

impl Constraint {
    /// True when `candidate` satisfies the constraint.
    pub fn matches(&self, candidate: &Version) -> bool {
        let Some(version) = &self.version else {
            return true; // `*`
        };
        match self.op {
            Operator::Any => true,
            Operator::Exact => same_release(candidate, version),
            Operator::NotEqual => !same_release(candidate, version),
            Operator::Greater => candidate.cmp_precedence(version).is_gt(),
            Operator::GreaterEq => candidate.cmp_precedence(version).is_ge(),
            Operator::Less => candidate.cmp_precedence(version).is_lt(),
            Operator::LessEq => candidate.cmp_precedence(version).is_le(),
            Operator::Tilde => range(RangeOp::Tilde, version).matches(candidate),
            Operator::Caret => range(RangeOp::Caret, version).matches(candidate),
        }
    }
}

/// Equality on the release triple plus pre-release tag, ignoring build
/// metadata: `v0.1.0+linux` and `v0.1.0` name the same release.
fn same_release(a: &Version, b: &Version) -> bool {
    a.major == b.major && a.minor == b.minor && a.patch == b.patch && a.pre == b.pre
}

fn range(op: RangeOp, version: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op,
            major: version.major,
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre.clone(),
        }],
    }
}

/// Strip the conventional `v`/`V` prefix and parse a concrete version.
pub fn parse_version(s: &str) -> Result<Version, semver::Error> {
    Version::parse(s.strip_prefix(['v', 'V']).unwrap_or(s))
}

impl FromStr for Constraint {
    type Err = ConstraintError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self {
                raw: raw.to_string(),
                op: Operator::Any,
                version: None,
            });
        }

        // Two-character operators must be tried first.
        let (op, rest) = if let Some(rest) = trimmed.strip_prefix(">=") {
            (Operator::GreaterEq, rest)
        } else if let Some(rest) = trimmed.strip_prefix("<=") {
            (Operator::LessEq, rest)
        } else if let Some(rest) = trimmed.strip_prefix("!=") {
            (Operator::NotEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix('=') {
            (Operator::Exact, rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            (Operator::Greater, rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (Operator::Less, rest)
        } else if let Some(rest) = trimmed.strip_prefix('~') {
            (Operator::Tilde, rest)
        } else if let Some(rest) = trimmed.strip_prefix('^') {
            (Operator::Caret, rest)
        } else {
            (Operator::Exact, trimmed)
        };

        let version = parse_version(rest.trim()).map_err(|e| ConstraintError {
            expression: raw.to_string(),
            detail: e.to_string(),
        })?;

        Ok(Self {
            raw: raw.to_string(),
            op,
            version: Some(version),
        })
    }
}

// Display shows the original expression so log lines carry what the caller
// actually sent.
impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(expr: &str, version: &str) -> bool {
        let constraint: Constraint = expr.parse().expect("constraint parses");
        constraint.matches(&parse_version(version).expect("version parses"))
    }

    #[test]
    fn star_matches_everything() {
        assert!(matches("*", "v0.1.0"));
        assert!(matches("*", "v9.9.9"));
        assert!(matches("", "v0.1.0"));
    }

    #[test]
    fn bare_version_means_exact() {
        assert!(matches("v0.1.0", "v0.1.0"));
        assert!(!matches("v0.1.0", "v0.1.1"));
        assert!(matches("0.1.0", "v0.1.0"));
    }

    #[test]
    fn explicit_exact() {
        assert!(matches("=v0.2.0", "v0.2.0"));
        assert!(!matches("=v0.2.0", "v0.1.0"));
    }

    #[test]
    fn not_equal() {
        assert!(matches("!=v0.1.0", "v0.2.0"));
        assert!(!matches("!=v0.1.0", "v0.1.0"));
    }

    #[test]
    fn comparisons() {
        assert!(matches(">v0.1.0", "v0.2.0"));
        assert!(!matches(">v0.1.0", "v0.1.0"));
        assert!(matches(">=v0.1.0", "v0.1.0"));
        assert!(matches("<v0.2.0", "v0.1.0"));
        assert!(!matches("<v0.2.0", "v0.2.0"));
        assert!(matches("<=v0.2.0", "v0.2.0"));
    }

    #[test]
    fn tilde_pins_the_minor() {
        assert!(matches("~v0.1.0", "v0.1.5"));
        assert!(!matches("~v0.1.0", "v0.2.0"));
    }

    #[test]
    fn caret_allows_compatible_upgrades() {
        assert!(matches("^v1.2.0", "v1.9.0"));
        assert!(!matches("^v1.2.0", "v2.0.0"));
    }

    #[test]
    fn uppercase_v_prefix_accepted() {
        assert!(matches(">V0.1.0", "v0.2.0"));
    }

    #[test]
    fn exact_ignores_build_metadata() {
        assert!(matches("v0.0.0+deadbeef", "v0.0.0"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!("latest".parse::<Constraint>().is_err());
        assert!(">>v0.1.0".parse::<Constraint>().is_err());
        assert!("v0.1".parse::<Constraint>().is_err());
    }

    #[test]
    fn display_preserves_the_original_expression() {
        let constraint: Constraint = ">v0.8.0".parse().unwrap();
        assert_eq!(constraint.to_string(), ">v0.8.0");
    }
}
