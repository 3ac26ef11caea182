use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::{Cache, Result, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process [`Cache`].
///
/// Expired entries are dropped when read, or in bulk with
/// [`MemoryCache::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    /// Create a new empty [`MemoryCache`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    /// Number of entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, key: &str, value: Vec<u8>, expires_at: Option<Instant>) {
        self.entries
            .insert(key.to_owned(), Entry { value, expires_at });
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let now = Instant::now();
        {
            let Some(entry) = self.entries.get(key) else {
                return Err(StoreError::NotFound(key.to_owned()));
            };
            if !entry.is_expired(now) {
                return Ok(entry.value.clone());
            }
        }

        // The read guard must be released before removing.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Err(StoreError::NotFound(key.to_owned()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.insert(key, value.to_vec(), None);
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return self.del(key);
        }

        // A TTL past what `Instant` can represent never expires.
        let expires_at = Instant::now().checked_add(ttl);
        self.insert(key, value.as_bytes().to_vec(), expires_at);
        Ok(())
    }
}
