use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Key = (String, String);

/// Async mutexes keyed by a pair of strings, created on demand.
///
/// An entry lives only while some task holds or waits for it; the last
/// guard to drop removes it from the map.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

/// Held lock for one key.
pub struct KeyGuard<'a> {
    owner: &'a KeyedLocks,
    key: Key,
    guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, first: &str, second: &str) -> KeyGuard<'_> {
        let key = (first.to_string(), second.to_string());
        let mutex = self.map().entry(key.clone()).or_default().clone();

        KeyGuard {
            owner: self,
            key,
            guard: mutex.lock_owned().await,
        }
    }

    /// Keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<Key, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.map();
        // One reference in the map, one in this guard: nobody else waits.
        if Arc::strong_count(OwnedMutexGuard::mutex(&self.guard)) == 2 {
            locks.remove(&self.key);
        }
    }
}
