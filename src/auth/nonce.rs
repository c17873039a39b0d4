//! Replay protection store.
//!
//! A nonce record means "(access key, nonce) already consumed". Records are
//! never deleted explicitly; they simply stop counting once their TTL lapses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::auth::error::StoreError;

/// Atomic set-if-absent over (access key, nonce) pairs with expiry.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Returns `true` if the record was newly written, `false` if a live record existed.
    /// Check and write must happen as one atomic step.
    async fn set_if_absent(&self, access_key: &str, nonce: &str, ttl: Duration) -> Result<bool, StoreError>;
}

/// In-memory nonce store backed by a sharded concurrent map.
#[derive(Clone, Default)]
pub struct InMemoryNonceStore {
    inner: Arc<DashMap<(String, String), Instant>>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.inner.len())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Purge expired records every `every` until `shutdown` fires.
    pub async fn run_purge(self, every: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = every.as_secs(), "Nonce purge starting");
        let mut ticker = time::interval(every);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Expired nonces purged");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Nonce purge received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn set_if_absent(&self, access_key: &str, nonce: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).ok_or(StoreError::InvalidTtl(ttl))?;
        let key = (access_key.to_string(), nonce.to_string());

        // The entry guard holds the shard lock across check and write.
        let written = match self.inner.entry(key) {
            Entry::Occupied(mut record) => {
                if *record.get() <= now {
                    record.insert(expires_at);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                true
            }
        };
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_write_is_rejected() {
        let store = InMemoryNonceStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_if_absent("ak", "n1", ttl).await.unwrap());
        assert!(!store.set_if_absent("ak", "n1", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_nonces_are_scoped_per_access_key() {
        let store = InMemoryNonceStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_if_absent("ak-1", "n1", ttl).await.unwrap());
        assert!(store.set_if_absent("ak-2", "n1", ttl).await.unwrap());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_record_can_be_rewritten() {
        let store = InMemoryNonceStore::new();
        let ttl = Duration::from_secs(5);
        assert!(store.set_if_absent("ak", "n1", ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.set_if_absent("ak", "n1", ttl).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = InMemoryNonceStore::new();
        store.set_if_absent("ak", "short", Duration::from_secs(1)).await.unwrap();
        store.set_if_absent("ak", "long", Duration::from_secs(100)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task_bounds_store_to_live_window() {
        let store = InMemoryNonceStore::new();
        for i in 0..1000 {
            store.set_if_absent("ak", &format!("n-{i}"), Duration::from_secs(1)).await.unwrap();
        }
        assert_eq!(store.len(), 1000);

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(store.clone().run_purge(Duration::from_secs(1), rx));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.is_empty());

        store.set_if_absent("ak", "fresh", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(store.len(), 1);

        tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let store = InMemoryNonceStore::new();
        let err = store.set_if_absent("ak", "n1", Duration::MAX).await.unwrap_err();
        assert_eq!(err, StoreError::InvalidTtl(Duration::MAX));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_single_winner() {
        let store = InMemoryNonceStore::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.set_if_absent("ak", "same", Duration::from_secs(60)).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
