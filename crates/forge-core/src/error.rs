//! # Error Envelope
//!
//! The service-boundary error type. Every failure crossing a component
//! boundary is classified under a stable [`ErrorKind`] head and wraps its
//! provenance as a recursive reason, so clients can match on the head while
//! operators still see the full chain. The envelope serializes losslessly to
//! the wire form `{ "error": "<kind>", "reason": { ... } | null }`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifiers for build-service failures. Clients compare the head
/// string of an error envelope against these; the strings never change
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed platform, malformed constraint, or a disallowed
    /// build-metadata form.
    InvalidParameters,
    /// No catalog entry satisfies a constraint.
    CannotSatisfy,
    /// Store failure on get or put not attributable to duplication.
    AccessingArtifact,
    /// The Foundry failed; the reason carries its diagnostic.
    BuildingArtifact,
    /// An object with this id already exists. Never surfaced to clients:
    /// the coordinator recovers by re-querying the store.
    DuplicateObject,
    /// Cache-miss signal from the store.
    ObjectNotFound,
    /// Configuration-time failure while wiring the service.
    InitializingBuilder,
    /// The request surface could not decode the body.
    InvalidRequest,
    /// Client-side: the request could not be delivered.
    RequestFailed,
    /// Client-side: the response could not be decoded.
    InvalidResponse,
}

impl ErrorKind {
    /// The stable identifier string used as the envelope head.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameters => "invalid build parameters",
            Self::CannotSatisfy => "cannot satisfy dependency",
            Self::AccessingArtifact => "accessing artifact",
            Self::BuildingArtifact => "building artifact",
            Self::DuplicateObject => "object already exists",
            Self::ObjectNotFound => "object not found",
            Self::InitializingBuilder => "initializing builder",
            Self::InvalidRequest => "invalid request",
            Self::RequestFailed => "request failed",
            Self::InvalidResponse => "invalid response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recursive error envelope returned by the build service.
///
/// `error` is the head: either a stable [`ErrorKind`] identifier or, at the
/// leaf of a chain, a free-form diagnostic from a collaborator. `reason`
/// preserves the underlying cause. [`ForgeError::is`] walks the chain, so
/// matching a kind works no matter how deeply it was wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeError {
    error: String,
    #[serde(default)]
    reason: Option<Box<ForgeError>>,
}

impl ForgeError {
    /// An envelope with a kind head and no recorded reason.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            error: kind.as_str().to_string(),
            reason: None,
        }
    }

    /// Wrap an existing envelope under a kind head.
    pub fn new(kind: ErrorKind, reason: ForgeError) -> Self {
        Self {
            error: kind.as_str().to_string(),
            reason: Some(Box::new(reason)),
        }
    }

    /// Wrap a collaborator diagnostic under a kind head. The diagnostic
    /// becomes the leaf of the chain.
    pub fn wrap(kind: ErrorKind, cause: impl fmt::Display) -> Self {
        Self {
            error: kind.as_str().to_string(),
            reason: Some(Box::new(Self {
                error: cause.to_string(),
                reason: None,
            })),
        }
    }

    /// A leaf envelope with a free-form head. Used when deserializing
    /// foreign error chains and for collaborator diagnostics.
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            reason: None,
        }
    }

    /// The head identifier of this envelope.
    pub fn head(&self) -> &str {
        &self.error
    }

    /// The wrapped cause, if any.
    pub fn reason(&self) -> Option<&ForgeError> {
        self.reason.as_deref()
    }

    /// True when `kind` appears anywhere in the chain.
    pub fn is(&self, kind: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(err) = current {
            if err.error == kind.as_str() {
                return true;
            }
            current = err.reason();
        }
        false
    }
}

impl fmt::Display for ForgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.error, reason),
            None => f.write_str(&self.error),
        }
    }
}

impl std::error::Error for ForgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.reason
            .as_deref()
            .map(|r| r as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_chain_with_colons() {
        let err = ForgeError::new(
            ErrorKind::AccessingArtifact,
            ForgeError::wrap(ErrorKind::ObjectNotFound, "disk on fire"),
        );
        assert_eq!(
            err.to_string(),
            "accessing artifact: object not found: disk on fire"
        );
    }

    #[test]
    fn is_matches_any_link_in_the_chain() {
        let err = ForgeError::new(
            ErrorKind::AccessingArtifact,
            ForgeError::wrap(ErrorKind::ObjectNotFound, "gone"),
        );
        assert!(err.is(ErrorKind::AccessingArtifact));
        assert!(err.is(ErrorKind::ObjectNotFound));
        assert!(!err.is(ErrorKind::BuildingArtifact));
    }

    #[test]
    fn is_does_not_match_free_form_leaves() {
        let err = ForgeError::wrap(ErrorKind::BuildingArtifact, "exit status 1");
        assert!(err.is(ErrorKind::BuildingArtifact));
        assert!(!err.is(ErrorKind::InvalidParameters));
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let err = ForgeError::new(
            ErrorKind::InvalidParameters,
            ForgeError::message("only exact match is allowed for build versions"),
        );
        let encoded = serde_json::to_string(&err).unwrap();
        let decoded: ForgeError = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, err);
        assert!(decoded.is(ErrorKind::InvalidParameters));
        assert_eq!(
            decoded.reason().unwrap().head(),
            "only exact match is allowed for build versions"
        );
    }

    #[test]
    fn wire_shape_uses_error_and_reason_fields() {
        let err = ForgeError::wrap(ErrorKind::CannotSatisfy, "no version for k6>v9.0.0");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["error"], "cannot satisfy dependency");
        assert_eq!(value["reason"]["error"], "no version for k6>v9.0.0");
        assert_eq!(value["reason"]["reason"], serde_json::Value::Null);
    }

    #[test]
    fn deserializes_foreign_heads() {
        let decoded: ForgeError =
            serde_json::from_str(r#"{"error":"some future kind","reason":null}"#).unwrap();
        assert_eq!(decoded.head(), "some future kind");
        assert!(decoded.reason().is_none());
    }
}
