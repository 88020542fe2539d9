//! Keyed mutual exclusion with a bounded wait.
//!
//! A lock table holds the set of keys currently owned. Acquiring a key waits on a
//! condvar until the key is free or the timeout elapses. Keys never contend with
//! each other, so unrelated balances proceed in parallel.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

/// The key could not be acquired in time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("timed out after {waited_ms}ms waiting for lock on {resource}")]
pub struct LockTimeout {
    pub resource: String,
    pub waited_ms: u64,
}

#[derive(Debug)]
pub struct KeyedLocks<K> {
    held: Mutex<HashSet<K>>,
    released: Condvar,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + core::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free (or `timeout` elapses), then own it until the guard drops.
    pub fn acquire(&self, key: K, timeout: Duration) -> Result<KeyGuard<'_, K>, LockTimeout> {
        let started = Instant::now();
        let deadline = started + timeout;
        let timed_out = || LockTimeout {
            resource: format!("{key:?}"),
            waited_ms: started.elapsed().as_millis() as u64,
        };

        let mut held = self.table();
        while held.contains(&key) {
            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out());
            }
            held = match self.released.wait_timeout(held, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        held.insert(key.clone());

        Ok(KeyGuard { locks: self, key })
    }

    /// Whether `key` is currently owned by someone.
    pub fn is_held(&self, key: &K) -> bool {
        self.table().contains(key)
    }

    fn table(&self) -> MutexGuard<'_, HashSet<K>> {
        // The table is a plain set; a panic while holding it cannot leave it torn.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, key: &K) {
        self.table().remove(key);
        self.released.notify_all();
    }
}

/// Ownership of one key; released on drop.
#[derive(Debug)]
pub struct KeyGuard<'a, K>
where
    K: Eq + Hash + Clone + core::fmt::Debug,
{
    locks: &'a KeyedLocks<K>,
    key: K,
}

impl<K> KeyGuard<'_, K>
where
    K: Eq + Hash + Clone + core::fmt::Debug,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for KeyGuard<'_, K>
where
    K: Eq + Hash + Clone + core::fmt::Debug,
{
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn second_acquire_times_out_while_held() {
        let locks = KeyedLocks::new();
        let _guard = locks.acquire("a", Duration::from_millis(10)).unwrap();

        let err = locks.acquire("a", Duration::from_millis(20)).unwrap_err();
        assert!(err.waited_ms >= 20);
        assert!(locks.acquire("b", Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn drop_releases_key() {
        let locks = KeyedLocks::new();
        {
            let g = locks.acquire(7u32, Duration::from_millis(10)).unwrap();
            assert_eq!(*g.key(), 7);
            assert!(locks.is_held(&7));
        }
        assert!(!locks.is_held(&7));
    }

    #[test]
    fn waiter_wakes_when_holder_releases() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.acquire(1u8, Duration::from_millis(10)).unwrap();

        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || locks.acquire(1u8, Duration::from_secs(5)).is_ok())
        };
        thread::sleep(Duration::from_millis(30));
        drop(guard);

        assert!(waiter.join().unwrap());
    }
}
