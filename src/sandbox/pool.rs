//! Bounded sandbox pool
//!
//! Each submission checks out a sandbox for its whole run, so no two submissions share a
//! sandbox's memory ceiling or process table. Checkout waits while every sandbox is in use.

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::config::SandboxConfig;
use super::provider::{SandboxHandle, SandboxProvider};
use super::SandboxError;

type FreeList = Arc<Mutex<Vec<String>>>;

pub struct SandboxPool {
    provider: SandboxProvider,
    free: FreeList,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl SandboxPool {
    /// Create a pool over the given container names
    pub fn new(provider: SandboxProvider, names: Vec<String>) -> Self {
        let capacity = names.len();
        Self {
            provider,
            free: Arc::new(Mutex::new(names)),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        self.provider.config()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of sandboxes not currently checked out
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Check out a sandbox and apply `memory_limit_mb` as its ceiling for this lease
    pub async fn checkout(&self, memory_limit_mb: u32) -> Result<SandboxLease, SandboxError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SandboxError::PoolClosed)?;

        let name = lock(&self.free).pop().ok_or(SandboxError::PoolClosed)?;
        let slot = Slot {
            name,
            free: Arc::clone(&self.free),
        };
        debug!("Checked out sandbox {}", slot.name);

        let handle = self.provider.acquire(&slot.name, memory_limit_mb).await?;

        Ok(SandboxLease {
            handle,
            _slot: slot,
            _permit: permit,
        })
    }

    /// Stop handing out sandboxes; waiting and future checkouts fail
    pub fn close(&self) {
        self.permits.close();
    }
}

/// Container name held by a lease, returned to the free list on drop
struct Slot {
    name: String,
    free: FreeList,
}

impl Drop for Slot {
    fn drop(&mut self) {
        debug!("Returned sandbox {}", self.name);
        lock(&self.free).push(std::mem::take(&mut self.name));
    }
}

/// Exclusive use of one sandbox until dropped
pub struct SandboxLease {
    handle: SandboxHandle,
    // Field order matters: the slot goes back to the free list before the permit is released
    _slot: Slot,
    _permit: OwnedSemaphorePermit,
}

impl Deref for SandboxLease {
    type Target = SandboxHandle;

    fn deref(&self) -> &SandboxHandle {
        &self.handle
    }
}

fn lock(free: &FreeList) -> std::sync::MutexGuard<'_, Vec<String>> {
    free.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxConfig;
    use crate::testing::FakeRuntime;
    use std::time::Duration;

    fn pool(runtime: &Arc<FakeRuntime>, names: &[&str]) -> SandboxPool {
        let provider = SandboxProvider::new(runtime.clone(), SandboxConfig::default());
        SandboxPool::new(provider, names.iter().map(|n| n.to_string()).collect())
    }

    #[tokio::test]
    async fn test_concurrent_leases_get_distinct_sandboxes() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        let pool = pool(&runtime, &["a", "b"]);

        let first = pool.checkout(64).await.unwrap();
        let second = pool.checkout(128).await.unwrap();

        assert_ne!(first.name(), second.name());
        assert_eq!(pool.available(), 0);
    }

    #[tokio::test]
    async fn test_checkout_waits_until_a_lease_is_dropped() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        let pool = pool(&runtime, &["only"]);

        let lease = pool.checkout(64).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.checkout(64)).await;
        assert!(blocked.is_err());

        drop(lease);
        let lease = pool.checkout(256).await.unwrap();
        assert_eq!(lease.name(), "only");
        assert!(runtime.calls().contains(&"memory only 256".to_string()));
    }

    #[tokio::test]
    async fn test_failed_acquire_returns_the_slot() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        runtime.fail_builds();
        let pool = pool(&runtime, &["only"]);

        assert!(pool.checkout(64).await.is_err());
        assert_eq!(pool.available(), 1);
        assert_eq!(lock(&pool.free).len(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_checkout() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        let pool = pool(&runtime, &["only"]);

        pool.close();

        assert!(matches!(
            pool.checkout(64).await,
            Err(SandboxError::PoolClosed)
        ));
    }
}
