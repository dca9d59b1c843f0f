//! Sharded per-user lock table
//!
//! Award and Spend for the same user must be mutually exclusive; calls for
//! different users must proceed fully in parallel. A `DashMap` keyed by
//! user holds one async mutex per user, so there is no global lock anywhere
//! on the hot path. Entries are evicted when the last holder releases, so
//! the table tracks in-flight users, not every user ever seen.

use crate::types::UserId;
use crate::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout, Duration};

/// Per-user exclusive locks
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

/// Exclusive hold on one user's lock
///
/// Dropping the guard releases the mutex and removes the table entry if no
/// other task is waiting on it.
#[derive(Debug)]
pub struct UserLockGuard {
    user_id: UserId,
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        // Release the mutex first, then evict. `remove_if` holds the shard
        // lock, so the strong-count check cannot race a concurrent acquire
        // cloning the Arc out of the map.
        self.guard = None;
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl LockTable {
    /// Empty lock table
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Acquire the user's lock, waiting at most `wait`
    ///
    /// Timing out is a transient condition: the caller's request conflicts
    /// with an in-flight one and may be retried.
    pub async fn acquire(&self, user_id: &UserId, wait: Duration) -> Result<UserLockGuard> {
        let lock = self
            .locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = timeout(wait, lock.lock_owned()).await.map_err(|_| {
            Error::Transient(format!("Timed out waiting for lock on user {}", user_id))
        })?;

        Ok(UserLockGuard {
            user_id: user_id.clone(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        })
    }

    /// Number of users currently holding or waiting on a lock
    pub fn tracked_users(&self) -> usize {
        self.locks.len()
    }
}
