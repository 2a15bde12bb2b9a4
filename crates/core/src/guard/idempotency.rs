use crate::guard::store::KeyValueStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

const KEY_PREFIX: &str = "idempotency";
const PENDING: &str = "pending";
const COMPLETED: &str = "completed";

/// Deterministic fingerprint of a logical operation's inputs.
pub fn idempotency_key(parts: &[&str]) -> String {
    let digest = Sha256::digest(parts.join(":").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Dedupes task executions through the shared store. Store failures never block work.
#[derive(Clone)]
pub struct IdempotencyManager {
    store: Arc<dyn KeyValueStore>,
}

impl IdempotencyManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn store_key(task: &str, key: &str) -> String {
        format!("{KEY_PREFIX}:{task}:{key}")
    }

    /// `false` on the first call for `key` within `ttl`, `true` after that.
    pub async fn is_duplicate(&self, task: &str, key: &str, ttl: Duration) -> bool {
        match self
            .store
            .set_nx_ex(&Self::store_key(task, key), PENDING, ttl)
            .await
        {
            Ok(true) => {
                tracing::debug!(task, key, ttl_secs = ttl.as_secs(), "idempotency key created");
                false
            }
            Ok(false) => {
                tracing::warn!(task, key, "duplicate task detected");
                true
            }
            Err(err) => {
                tracing::error!(task, key, error = %err, "idempotency check failed; proceeding");
                false
            }
        }
    }

    pub async fn mark_completed(&self, task: &str, key: &str, ttl: Duration) {
        match self
            .store
            .set_ex(&Self::store_key(task, key), COMPLETED, ttl)
            .await
        {
            Ok(()) => tracing::info!(task, key, ttl_secs = ttl.as_secs(), "task marked completed"),
            Err(err) => tracing::error!(task, key, error = %err, "failed to mark task completed"),
        }
    }

    /// Forgets `key` so the task can run again.
    pub async fn clear(&self, task: &str, key: &str) {
        match self.store.delete(&Self::store_key(task, key)).await {
            Ok(()) => tracing::info!(task, key, "idempotency key cleared"),
            Err(err) => tracing::error!(task, key, error = %err, "failed to clear idempotency key"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::store::{MemoryStore, StoreError, StoreResult};

    struct DownStore;

    #[async_trait::async_trait]
    impl KeyValueStore for DownStore {
        fn provider_name(&self) -> &'static str {
            "down"
        }
        async fn get(&self, _: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Connection("refused".into()))
        }
        async fn set_nx_ex(&self, _: &str, _: &str, _: Duration) -> StoreResult<bool> {
            Err(StoreError::Connection("refused".into()))
        }
        async fn set_ex(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
            Err(StoreError::Connection("refused".into()))
        }
        async fn incr(&self, _: &str) -> StoreResult<i64> {
            Err(StoreError::Connection("refused".into()))
        }
        async fn expire(&self, _: &str, _: Duration) -> StoreResult<()> {
            Err(StoreError::Connection("refused".into()))
        }
        async fn delete(&self, _: &str) -> StoreResult<()> {
            Err(StoreError::Connection("refused".into()))
        }
    }

    #[test]
    fn key_is_stable_sha256_hex() {
        let a = idempotency_key(&["c1", "monthly", "2025-07-31"]);
        assert_eq!(a.len(), 64);
        assert_eq!(a, idempotency_key(&["c1", "monthly", "2025-07-31"]));
        assert_ne!(a, idempotency_key(&["c1", "weekly", "2025-07-31"]));
        assert_eq!(
            idempotency_key(&["a", "b"]),
            "6783a31eabf68ccc0660f935c0826282bdd2241f3a80a9f2d10d59aea9ebb5d8"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_within_ttl_then_fresh_after_expiry() {
        let m = IdempotencyManager::new(Arc::new(MemoryStore::new()));
        let ttl = Duration::from_secs(3600);

        assert!(!m.is_duplicate("generate_report", "k", ttl).await);
        assert!(m.is_duplicate("generate_report", "k", ttl).await);
        assert!(!m.is_duplicate("other_task", "k", ttl).await);

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(!m.is_duplicate("generate_report", "k", ttl).await);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_outlives_pending_window() {
        let store = Arc::new(MemoryStore::new());
        let m = IdempotencyManager::new(store.clone());
        let ttl = Duration::from_secs(60);

        assert!(!m.is_duplicate("t", "k", ttl).await);
        m.mark_completed("t", "k", ttl * 24).await;
        assert_eq!(
            store.get("idempotency:t:k").await.unwrap().as_deref(),
            Some("completed")
        );

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(m.is_duplicate("t", "k", ttl).await);
    }

    #[tokio::test]
    async fn clear_allows_rerun() {
        let m = IdempotencyManager::new(Arc::new(MemoryStore::new()));
        let ttl = Duration::from_secs(60);
        assert!(!m.is_duplicate("t", "k", ttl).await);
        m.clear("t", "k").await;
        assert!(!m.is_duplicate("t", "k", ttl).await);
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let m = IdempotencyManager::new(Arc::new(DownStore));
        assert!(!m.is_duplicate("t", "k", Duration::from_secs(60)).await);
        assert!(!m.is_duplicate("t", "k", Duration::from_secs(60)).await);
        m.mark_completed("t", "k", Duration::from_secs(60)).await;
        m.clear("t", "k").await;
    }
}
