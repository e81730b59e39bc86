//! Bounded exponential backoff for transient store failures.

use super::ObjectStore;
use crate::error::StoreResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently to retry transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based), doubling up to `max_backoff`.
    pub fn next_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.next_delay(attempt - 1);
                    warn!(
                        target_path = what,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient store error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Store wrapper applying a [`RetryPolicy`] to every read.
#[derive(Debug, Clone)]
pub struct RetryingStore {
    inner: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    /// Wrap a store.
    pub fn new(inner: Arc<dyn ObjectStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Retry policy in use.
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl ObjectStore for RetryingStore {
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.policy.run(path, || self.inner.get(path)).await
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_next_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.next_delay(0), Duration::from_millis(100));
        assert_eq!(policy.next_delay(1), Duration::from_millis(200));
        assert_eq!(policy.next_delay(2), Duration::from_millis(350));
        assert_eq!(policy.next_delay(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let memory = Arc::new(MemoryStore::new());
        memory.insert("a", b"x".to_vec());
        memory.fail_transiently("a", 2);

        let store = RetryingStore::new(memory.clone(), fast(3));
        assert_eq!(store.get("a").await.unwrap(), b"x");
        assert_eq!(memory.fetches_of("a"), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let memory = Arc::new(MemoryStore::new());
        memory.insert("a", b"x".to_vec());
        memory.fail_transiently("a", 10);

        let store = RetryingStore::new(memory.clone(), fast(3));
        assert!(store.get("a").await.unwrap_err().is_transient());
        assert_eq!(memory.fetches_of("a"), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let memory = Arc::new(MemoryStore::new());
        memory.insert("denied", b"x".to_vec());
        memory.deny("denied");

        let store = RetryingStore::new(memory.clone(), fast(5));
        assert!(store.get("missing").await.unwrap_err().is_not_found());
        assert!(matches!(
            store.get("denied").await,
            Err(StoreError::PermissionDenied { .. })
        ));
        assert_eq!(memory.fetches_of("missing"), 1);
        assert_eq!(memory.fetches_of("denied"), 1);
    }

    #[tokio::test]
    async fn test_none_policy_tries_once() {
        let memory = Arc::new(MemoryStore::new());
        memory.fail_transiently("a", 1);
        let store = RetryingStore::new(memory.clone(), RetryPolicy::none());
        assert!(store.get("a").await.is_err());
        assert_eq!(memory.fetch_count(), 1);
    }
}
