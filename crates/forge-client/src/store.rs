//! # Store Service Client
//!
//! `ObjectStore` over HTTP against the store service. `put` carries the
//! `If-None-Match: *` precondition so a concurrent writer's win comes back
//! as a distinct 412, which maps to the duplicate error the coordinator
//! recovers from. Downloads follow the presigned URL carried in the object
//! metadata.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::IF_NONE_MATCH;
use reqwest::StatusCode;
use tokio_util::io::StreamReader;

use forge_store::{Object, ObjectBody, ObjectStore, StoreError};

use crate::retry::Backoff;

/// Client for a remote store service.
#[derive(Debug, Clone)]
pub struct StoreClient {
    server: String,
    client: reqwest::Client,
    backoff: Backoff,
}

impl StoreClient {
    /// Client against the store service at `server`.
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

    fn object_url(&self, id: &str) -> String {
        format!("{}/store/{id}", self.server)
    }
}

#[async_trait]
impl ObjectStore for StoreClient {
    async fn put(&self, id: &str, content: &[u8]) -> Result<Object, StoreError> {
        forge_store::validate_id(id)?;

        let body = content.to_vec();
        let url = self.object_url(id);
        let response = self
            .backoff
            .run("store put", || {
                self.client
                    .put(&url)
                    .header(IF_NONE_MATCH, "*")
                    .body(body.clone())
                    .send()
            })
            .await
            .map_err(|e| StoreError::Creating(e.to_string()))?;

        match response.status() {
            StatusCode::PRECONDITION_FAILED => Err(StoreError::Duplicate(id.to_string())),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| StoreError::Creating(e.to_string())),
            status => Err(StoreError::Creating(format!(
                "store replied {status}: {}",
                response.text().await.unwrap_or_default()
            ))),
        }
    }

    async fn get(&self, id: &str) -> Result<Object, StoreError> {
        forge_store::validate_id(id)?;

        let url = self.object_url(id);
        let response = self
            .backoff
            .run("store get", || self.client.get(&url).send())
            .await
            .map_err(|e| StoreError::Accessing(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| StoreError::Accessing(e.to_string())),
            status => Err(StoreError::Accessing(format!("store replied {status}"))),
        }
    }

    async fn download(&self, object: &Object) -> Result<ObjectBody, StoreError> {
        if !object.url.starts_with("http://") && !object.url.starts_with("https://") {
            return Err(StoreError::InvalidUrl(object.url.clone()));
        }

        let url = object.url.clone();
        let response = self
            .backoff
            .run("store download", || self.client.get(&url).send())
            .await
            .map_err(|e| StoreError::Accessing(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(object.id.clone())),
            status if status.is_success() => {
                let stream = response
                    .bytes_stream()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
                Ok(Box::new(StreamReader::new(Box::pin(stream))) as ObjectBody)
            }
            status => Err(StoreError::Accessing(format!("store replied {status}"))),
        }
    }
}
