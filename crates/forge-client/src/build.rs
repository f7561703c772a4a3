//! # Build API Client
//!
//! `BuildService` over HTTP. Domain failures arrive inside the response
//! envelope and are returned untouched, so a remote coordinator's errors
//! look exactly like a local one's.

use std::collections::BTreeMap;

use async_trait::async_trait;

use forge_core::api::{BuildRequest, BuildResponse, ResolveResponse};
use forge_core::{Artifact, BuildService, Dependency, ErrorKind, ForgeError};

use crate::retry::Backoff;

/// Client for a remote build service.
#[derive(Debug, Clone)]
pub struct BuildServiceClient {
    server: String,
    client: reqwest::Client,
    backoff: Backoff,
}

impl BuildServiceClient {
    /// Client against the service at `server` (scheme + authority, no
    /// trailing slash required).
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            backoff: Backoff::default(),
        }
    }

    /// Replace the transport retry policy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn post(&self, resource: &str, request: &BuildRequest) -> Result<reqwest::Response, ForgeError> {
        let url = format!("{}/{resource}", self.server);
        self.backoff
            .run(resource, || self.client.post(&url).json(request).send())
            .await
            .map_err(|e| ForgeError::wrap(ErrorKind::RequestFailed, e))
    }
}

#[async_trait]
impl BuildService for BuildServiceClient {
    async fn build(
        &self,
        platform: &str,
        k6_constraints: &str,
        dependencies: Vec<Dependency>,
    ) -> Result<Artifact, ForgeError> {
        let request = BuildRequest {
            platform: platform.to_string(),
            k6_constraints: k6_constraints.to_string(),
            dependencies,
        };

        let response = self.post("build", &request).await?;
        let body: BuildResponse = response
            .json()
            .await
            .map_err(|e| ForgeError::wrap(ErrorKind::InvalidResponse, e))?;

        if let Some(error) = body.error {
            return Err(error);
        }
        body.artifact
            .ok_or_else(|| ForgeError::wrap(ErrorKind::InvalidResponse, "empty response"))
    }

    async fn resolve(
        &self,
        k6_constraints: &str,
        dependencies: Vec<Dependency>,
    ) -> Result<BTreeMap<String, String>, ForgeError> {
        let request = BuildRequest {
            platform: String::new(),
            k6_constraints: k6_constraints.to_string(),
            dependencies,
        };

        let response = self.post("resolve", &request).await?;
        let body: ResolveResponse = response
            .json()
            .await
            .map_err(|e| ForgeError::wrap(ErrorKind::InvalidResponse, e))?;

        if let Some(error) = body.error {
            return Err(error);
        }
        body.resolved
            .ok_or_else(|| ForgeError::wrap(ErrorKind::InvalidResponse, "empty response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn build_returns_the_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/build"))
            .and(body_partial_json(serde_json::json!({
                "platform": "linux/amd64",
                "k6Constrains": "v0.1.0"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "artifact": {
                    "id": "abc123",
                    "url": "http://store/abc123/download",
                    "dependencies": { "k6": "v0.1.0" },
                    "platform": "linux/amd64",
                    "checksum": "deadbeef"
                },
                "error": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let artifact = BuildServiceClient::new(server.uri())
            .build("linux/amd64", "v0.1.0", vec![])
            .await
            .unwrap();
        assert_eq!(artifact.id, "abc123");
        assert_eq!(artifact.dependencies["k6"], "v0.1.0");
    }

    #[tokio::test]
    async fn domain_errors_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/build"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "artifact": null,
                "error": {
                    "error": "cannot satisfy dependency",
                    "reason": { "error": "no version of k6 satisfies \">v0.2.0\"", "reason": null }
                }
            })))
            .mount(&server)
            .await;

        let err = BuildServiceClient::new(server.uri())
            .build("linux/amd64", ">v0.2.0", vec![])
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::CannotSatisfy));
    }

    #[tokio::test]
    async fn undecodable_bodies_are_invalid_responses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/build"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = BuildServiceClient::new(server.uri())
            .build("linux/amd64", "v0.1.0", vec![])
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::InvalidResponse));
    }

    #[tokio::test]
    async fn resolve_returns_the_map() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resolve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resolved": { "k6": "v0.2.0", "k6/x/ext": "v0.1.0" },
                "error": null
            })))
            .mount(&server)
            .await;

        let resolved = BuildServiceClient::new(server.uri())
            .resolve(">v0.1.0", vec![Dependency::new("k6/x/ext", "v0.1.0")])
            .await
            .unwrap();
        assert_eq!(resolved["k6"], "v0.2.0");
        assert_eq!(resolved["k6/x/ext"], "v0.1.0");
    }
}
