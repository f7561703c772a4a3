//! # Cross-Process Lease Lock
//!
//! Serializes builders that share a store but not a process. A lease is a
//! uuid-named file under `<root>/<id>/`; the holder is the oldest
//! non-expired lease for the id, with the file name breaking timestamp
//! ties. Releasing deletes the file. A lease older than the configured
//! duration is expired and pruned by whoever sees it, which bounds recovery
//! time after a crashed holder.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use uuid::Uuid;

use crate::locks::{ArtifactLock, LockError, LockGuard};

/// Default lease lifetime.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(5 * 60);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lease-based lock over a shared directory.
#[derive(Debug, Clone)]
pub struct FileLeaseLock {
    root: PathBuf,
    duration: Duration,
}

impl FileLeaseLock {
    /// Lease locks rooted at `root`, with the default 5-minute duration.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            duration: DEFAULT_LEASE_DURATION,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// The oldest non-expired lease in `dir`, pruning expired ones along
    /// the way. Returns the winning file name.
    async fn winner(&self, dir: &PathBuf) -> Result<Option<String>, LockError> {
        let now = SystemTime::now();
        let mut best: Option<(SystemTime, String)> = None;

        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(meta) = entry.metadata().await else {
                continue; // released concurrently
            };
            let created = meta.modified()?;

            let expired = now
                .duration_since(created)
                .map(|age| age > self.duration)
                .unwrap_or(false);
            if expired {
                let _ = tokio::fs::remove_file(entry.path()).await;
                continue;
            }

            let beats = match &best {
                None => true,
                Some((time, tiebreak)) => (created, &name) < (*time, tiebreak),
            };
            if beats {
                best = Some((created, name));
            }
        }

        Ok(best.map(|(_, name)| name))
    }
}

#[async_trait]
impl ArtifactLock for FileLeaseLock {
    async fn acquire(&self, id: &str) -> Result<LockGuard, LockError> {
        let dir = self.root.join(id);
        tokio::fs::create_dir_all(&dir).await?;

        let name = Uuid::new_v4().to_string();
        let own = dir.join(&name);
        tokio::fs::write(&own, []).await?;

        loop {
            match self.winner(&dir).await? {
                Some(winner) if winner == name => break,
                _ => {
                    // Our lease may have been pruned while we waited (it
                    // expired); a rewrite moves us to the back of the queue.
                    if !tokio::fs::try_exists(&own).await? {
                        tokio::fs::write(&own, []).await?;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }

        Ok(LockGuard::new(move || {
            let _ = std::fs::remove_file(&own);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let locks = FileLeaseLock::new(dir.path());

        let guard = locks.acquire("abc").await.unwrap();
        let leases = std::fs::read_dir(dir.path().join("abc")).unwrap().count();
        assert_eq!(leases, 1);

        drop(guard);
        let leases = std::fs::read_dir(dir.path().join("abc")).unwrap().count();
        assert_eq!(leases, 0);
    }

    #[tokio::test]
    async fn contenders_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let locks = Arc::new(FileLeaseLock::new(dir.path()));
        let in_critical = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let in_critical = in_critical.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("abc").await.unwrap();
                let now = in_critical.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_critical.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_leases_are_preempted() {
        let dir = tempfile::tempdir().unwrap();

        // A crashed holder left a lease behind. Once it outlives the lease
        // duration a new contender prunes it and wins.
        let stale = dir.path().join("abc");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("dead-holder"), []).unwrap();

        let locks = FileLeaseLock::new(dir.path()).with_duration(Duration::from_millis(200));
        tokio::time::sleep(Duration::from_millis(300)).await;

        let _guard = tokio::time::timeout(Duration::from_secs(2), locks.acquire("abc"))
            .await
            .expect("stale lease must be preempted")
            .unwrap();
        assert!(!stale.join("dead-holder").exists(), "stale lease pruned");
    }
}
