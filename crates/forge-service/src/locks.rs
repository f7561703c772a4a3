//! # Per-Fingerprint Serialization
//!
//! At most one build per artifact id at a time. [`MemoryLock`] is the
//! in-process table: entries are created on demand and removed on release.
//! A later acquirer may recreate a just-removed entry and proceed. That is
//! safe, because after the first successful build the store answers the
//! lookup and no second build happens.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

/// Lock acquisition failures. The in-memory table cannot fail; the lease
/// variant can.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("error locking: {0}")]
    Io(#[from] std::io::Error),
}

/// Held lock for one artifact id. Dropping the guard releases the slot, so
/// release runs on every exit path, including cancellation.
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    pub(crate) fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

/// Mutual exclusion keyed by artifact id.
#[async_trait]
pub trait ArtifactLock: Send + Sync {
    /// Block until no other holder has `id`, then take it.
    async fn acquire(&self, id: &str) -> Result<LockGuard, LockError>;
}

/// In-process lock table.
#[derive(Debug, Default)]
pub struct MemoryLock {
    table: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactLock for MemoryLock {
    async fn acquire(&self, id: &str) -> Result<LockGuard, LockError> {
        let slot = self
            .table
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;

        let table = Arc::clone(&self.table);
        let id = id.to_string();
        Ok(LockGuard::new(move || {
            table.remove(&id);
            drop(guard);
        }))
    }
}
