//! Per-user single-writer discipline for ledger mutations.
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other mutation for `user_id` is in flight.
    pub async fn acquire(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub async fn cleanup(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        tracing::debug!("User lock cleanup: {} active users", locks.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let locks = UserLocks::new();
        let user = Uuid::new_v4();

        let guard = locks.acquire(user).await;
        let waiting = tokio::time::timeout(Duration::from_millis(50), locks.acquire(user)).await;
        assert!(waiting.is_err());

        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.acquire(user)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire(Uuid::new_v4())).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_held_locks() {
        let locks = UserLocks::new();
        let held = Uuid::new_v4();
        let _guard = locks.acquire(held).await;
        drop(locks.acquire(Uuid::new_v4()).await);

        locks.cleanup().await;

        let map = locks.locks.lock().await;
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&held));
    }
}
