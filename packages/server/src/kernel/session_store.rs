//! Per-user ephemeral state.
//!
//! # Guarantees
//!
//! - **Per-key consistency**: `get`/`set`/`delete` on one user are atomic with
//!   respect to each other; different users never contend on one lock
//!   (sharded map).
//! - **Ephemeral**: nothing survives a restart. A user mid-conversation simply
//!   starts over.
//! - **Ordering** is not provided by the store itself; callers that need a
//!   read-modify-write sequence per user hold that user's [`UserLocks`] guard.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Opaque user identity (the chat platform's numeric user id).
pub type UserId = i64;

pub trait SessionStore<V>: Send + Sync {
    /// Current value, or `None` if the user has no state. Never an error.
    fn get(&self, user: UserId) -> Option<V>;

    fn set(&self, user: UserId, value: V);

    fn delete(&self, user: UserId);
}

struct Entry<V> {
    value: V,
    touched: Instant,
}

/// In-memory [`SessionStore`] backed by a sharded map.
pub struct MemorySessionStore<V> {
    entries: DashMap<UserId, Entry<V>>,
}

impl<V> MemorySessionStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry not written for at least `max_idle`. Returns how many.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.touched.elapsed() < max_idle);
        before.saturating_sub(self.entries.len())
    }
}

impl<V> Default for MemorySessionStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> SessionStore<V> for MemorySessionStore<V> {
    fn get(&self, user: UserId) -> Option<V> {
        self.entries.get(&user).map(|entry| entry.value.clone())
    }

    fn set(&self, user: UserId, value: V) {
        self.entries.insert(
            user,
            Entry {
                value,
                touched: Instant::now(),
            },
        );
    }

    fn delete(&self, user: UserId) {
        self.entries.remove(&user);
    }
}

/// One async mutex per user, created on demand.
#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user`. Waiters are served in FIFO order.
    pub async fn acquire(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(user).or_default().clone();
        lock.lock_owned().await
    }

    /// Forget locks nobody holds or waits on. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }
}
