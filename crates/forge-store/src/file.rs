//! # Local Filesystem Store
//!
//! One directory per object id under the store root:
//!
//! ```text
//! <root>/<id>/data        binary bytes
//! <root>/<id>/checksum    lowercase hex SHA-256, no trailing newline
//! ```
//!
//! New objects are staged under `<root>/.tmp` and published with a single
//! directory rename, so a failed put leaves nothing visible. Download URLs
//! are `file://` URLs to the `data` file; download sanitises the URL path
//! against the store root before opening anything.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use url::Url;

use crate::{validate_id, Object, ObjectBody, ObjectStore, StoreError};

const DATA_FILE: &str = "data";
const CHECKSUM_FILE: &str = "checksum";
const STAGING_DIR: &str = ".tmp";

/// Object store backed by a directory tree.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // One writer per id at a time within this process; cross-process races
    // are resolved by the atomic rename.
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .map_err(|e| StoreError::Initializing(format!("{}: {e}", root.display())))?;
        set_dir_mode(root).map_err(|e| StoreError::Initializing(e.to_string()))?;
        let root = root
            .canonicalize()
            .map_err(|e| StoreError::Initializing(format!("{}: {e}", root.display())))?;
        Ok(Self {
            root,
            inflight: DashMap::new(),
        })
    }

    /// The canonicalised store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn object_url(&self, id: &str) -> Result<String, StoreError> {
        let path = self.object_dir(id).join(DATA_FILE);
        Url::from_file_path(&path)
            .map(|u| u.to_string())
            .map_err(|()| StoreError::InvalidUrl(path.display().to_string()))
    }

    /// Resolve a `file://` URL to a path that is provably inside the store
    /// root. Rejects relative paths and any traversal out of the root.
    fn sanitize(&self, url: &Url) -> Result<PathBuf, StoreError> {
        let path = url
            .to_file_path()
            .map_err(|()| StoreError::InvalidUrl(url.to_string()))?;
        if !path.is_absolute() {
            return Err(StoreError::InvalidUrl(path.display().to_string()));
        }
        let clean = normalize(&path);
        if !clean.starts_with(&self.root) {
            return Err(StoreError::InvalidUrl(path.display().to_string()));
        }
        Ok(clean)
    }

    async fn write_staged(&self, staging: &Path, content: &[u8]) -> Result<String, StoreError> {
        let creating = |e: std::io::Error| StoreError::Creating(e.to_string());

        tokio::fs::create_dir_all(staging).await.map_err(creating)?;
        set_dir_mode(staging).map_err(creating)?;

        let checksum = hex::encode(Sha256::digest(content));
        let data_path = staging.join(DATA_FILE);
        tokio::fs::write(&data_path, content).await.map_err(creating)?;
        set_file_mode(&data_path).map_err(creating)?;

        let checksum_path = staging.join(CHECKSUM_FILE);
        tokio::fs::write(&checksum_path, checksum.as_bytes())
            .await
            .map_err(creating)?;
        set_file_mode(&checksum_path).map_err(creating)?;

        Ok(checksum)
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    async fn put(&self, id: &str, content: &[u8]) -> Result<Object, StoreError> {
        validate_id(id)?;

        let slot = self
            .inflight
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = slot.lock().await;

        let object_dir = self.object_dir(id);
        if tokio::fs::try_exists(&object_dir)
            .await
            .map_err(|e| StoreError::Creating(e.to_string()))?
        {
            self.inflight.remove(id);
            return Err(StoreError::Duplicate(id.to_string()));
        }

        let staging = self
            .root
            .join(STAGING_DIR)
            .join(format!("{id}.{}", uuid::Uuid::new_v4()));

        let result = self.write_staged(&staging, content).await;
        let checksum = match result {
            Ok(checksum) => checksum,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&staging).await;
                self.inflight.remove(id);
                return Err(e);
            }
        };

        // Publish: a single rename makes data and checksum visible together.
        if let Err(e) = tokio::fs::rename(&staging, &object_dir).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            self.inflight.remove(id);
            if tokio::fs::try_exists(&object_dir).await.unwrap_or(false) {
                return Err(StoreError::Duplicate(id.to_string()));
            }
            return Err(StoreError::Creating(e.to_string()));
        }

        self.inflight.remove(id);
        Ok(Object {
            id: id.to_string(),
            checksum,
            url: self.object_url(id)?,
        })
    }

    async fn get(&self, id: &str) -> Result<Object, StoreError> {
        validate_id(id)?;

        let object_dir = self.object_dir(id);
        match tokio::fs::metadata(&object_dir).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::Accessing(e.to_string())),
        }

        let checksum = tokio::fs::read_to_string(object_dir.join(CHECKSUM_FILE))
            .await
            .map_err(|e| StoreError::Accessing(e.to_string()))?;

        Ok(Object {
            id: id.to_string(),
            checksum,
            url: self.object_url(id)?,
        })
    }

    async fn download(&self, object: &Object) -> Result<ObjectBody, StoreError> {
        let url =
            Url::parse(&object.url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "file" {
            return Err(StoreError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let path = self.sanitize(&url)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(object.id.clone()))
            }
            Err(e) => Err(StoreError::Accessing(e.to_string())),
        }
    }
}

/// Lexical path normalization: resolves `.` and `..` without touching the
/// filesystem, so traversal is caught even for paths that do not exist.
fn normalize(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }
    clean
}

#[cfg(unix)]
fn set_dir_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o750))
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
