//! Run lease that keeps reconciliation runs from overlapping.
//!
//! The lease carries an expiry so a run that dies without releasing it
//! cannot block later runs forever.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::BlobStore;

const LOCK_FILE: &str = "running.lock";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Lease {
    owner: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Current state of the lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Free,
    Held {
        owner: String,
        expires_at: DateTime<Utc>,
    },
    Expired {
        owner: String,
    },
}

impl LockStatus {
    pub fn is_held(&self) -> bool {
        matches!(self, LockStatus::Held { .. })
    }
}

/// A lease stored as a small JSON blob.
pub struct RunLock {
    store: Arc<dyn BlobStore>,
    key: String,
    owner: String,
}

impl RunLock {
    pub fn new(store: Arc<dyn BlobStore>, prefix: &str) -> Self {
        let owner = format!("{}-{}", std::process::id(), Utc::now().timestamp_millis());
        Self::with_owner(store, prefix, owner)
    }

    pub fn with_owner(store: Arc<dyn BlobStore>, prefix: &str, owner: impl Into<String>) -> Self {
        Self {
            store,
            key: format!("{}/{}", prefix.trim_end_matches('/'), LOCK_FILE),
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    async fn read_lease(&self) -> Result<Option<Lease>> {
        let Some(bytes) = self.store.read(&self.key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(lease) => Ok(Some(lease)),
            Err(e) => {
                log::warn!("Ignoring malformed run lease {}: {}", self.key, e);
                Ok(None)
            }
        }
    }

    /// Inspect the lease as of now.
    pub async fn status(&self) -> Result<LockStatus> {
        self.status_at(Utc::now()).await
    }

    async fn status_at(&self, now: DateTime<Utc>) -> Result<LockStatus> {
        Ok(match self.read_lease().await? {
            None => LockStatus::Free,
            Some(lease) if lease.expires_at > now => LockStatus::Held {
                owner: lease.owner,
                expires_at: lease.expires_at,
            },
            Some(lease) => LockStatus::Expired { owner: lease.owner },
        })
    }

    /// Take the lease for `ttl`. Returns `false` if another run holds it.
    pub async fn try_acquire(&self, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        match self.status_at(now).await? {
            LockStatus::Held { owner, expires_at } if owner != self.owner => {
                log::info!("Run lease held by {} until {}", owner, expires_at);
                return Ok(false);
            }
            LockStatus::Expired { owner } => {
                log::warn!("Taking over expired run lease from {}", owner);
            }
            _ => {}
        }

        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1));
        let lease = Lease {
            owner: self.owner.clone(),
            acquired_at: now,
            expires_at: now + ttl,
        };
        self.store
            .write(&self.key, &serde_json::to_vec(&lease)?)
            .await?;
        log::debug!("Acquired run lease {} until {}", self.key, lease.expires_at);
        Ok(true)
    }

    /// Drop the lease if this instance still owns it.
    pub async fn release(&self) -> Result<()> {
        match self.read_lease().await? {
            Some(lease) if lease.owner != self.owner => {
                log::warn!(
                    "Run lease now owned by {}, leaving it in place",
                    lease.owner
                );
                Ok(())
            }
            _ => {
                self.store.delete(&self.key).await?;
                log::debug!("Released run lease {}", self.key);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    const PREFIX: &str = "check-product-changes";

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = Arc::new(MemoryStorage::new());
        let lock = RunLock::with_owner(store.clone(), PREFIX, "a");

        assert_eq!(lock.status().await.unwrap(), LockStatus::Free);
        assert!(lock.try_acquire(Duration::from_secs(60)).await.unwrap());
        assert!(lock.status().await.unwrap().is_held());

        lock.release().await.unwrap();
        assert_eq!(lock.status().await.unwrap(), LockStatus::Free);
    }

    #[tokio::test]
    async fn test_second_owner_is_refused() {
        let store = Arc::new(MemoryStorage::new());
        let first = RunLock::with_owner(store.clone(), PREFIX, "a");
        let second = RunLock::with_owner(store.clone(), PREFIX, "b");

        assert!(first.try_acquire(Duration::from_secs(60)).await.unwrap());
        assert!(!second.try_acquire(Duration::from_secs(60)).await.unwrap());

        // A foreign release leaves the lease alone.
        second.release().await.unwrap();
        assert!(first.status().await.unwrap().is_held());
    }

    #[tokio::test]
    async fn test_expired_lease_is_taken_over() {
        let store = Arc::new(MemoryStorage::new());
        let stale = Lease {
            owner: "dead".into(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        store.put(
            "check-product-changes/running.lock",
            &serde_json::to_vec(&stale).unwrap(),
        );

        let lock = RunLock::with_owner(store.clone(), PREFIX, "b");
        assert_eq!(
            lock.status().await.unwrap(),
            LockStatus::Expired {
                owner: "dead".into()
            }
        );
        assert!(lock.try_acquire(Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_lease_counts_as_free() {
        let store = Arc::new(MemoryStorage::new());
        store.put("check-product-changes/running.lock", b"true");

        let lock = RunLock::with_owner(store, PREFIX, "a");
        assert_eq!(lock.status().await.unwrap(), LockStatus::Free);
    }
}
