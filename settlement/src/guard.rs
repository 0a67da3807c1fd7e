//! Per-user serialization of mutating operations
//!
//! No two mutating operations for the same user may interleave their
//! read-validate-commit sequence; operations for different users run fully
//! in parallel. The engine holds a user's lock for the whole critical
//! section, and the store's compare-and-swap remains the backstop for any
//! writer that bypasses the guard.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use wallet_core::types::UserId;

/// Registry of per-user async locks
#[derive(Debug, Default)]
pub struct UserGuard {
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl UserGuard {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock serializing this user's mutations
    ///
    /// The guard is held across store round trips, so the lock is async;
    /// a second operation for the same user parks here until the first
    /// commits or fails.
    pub async fn acquire(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Number of users with a registered lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no user has locked yet
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let guard = UserGuard::new();
        let user = UserId::new("u1");

        let held = guard.acquire(&user).await;

        // A second acquire for the same user must park
        let blocked = timeout(Duration::from_millis(50), guard.acquire(&user)).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired = timeout(Duration::from_millis(50), guard.acquire(&user)).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_users_run_in_parallel() {
        let guard = UserGuard::new();

        let _a = guard.acquire(&UserId::new("u1")).await;
        let b = timeout(Duration::from_millis(50), guard.acquire(&UserId::new("u2"))).await;
        assert!(b.is_ok());
        assert_eq!(guard.len(), 2);
    }
}
