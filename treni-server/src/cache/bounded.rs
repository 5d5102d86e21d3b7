//! Size-bounded cache backed by moka.
//!
//! Used instead of [`super::MemoryCache`] when a maximum entry count is
//! configured. Expiry is per entry: each value carries the TTL it was
//! stored with.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache as MokaCache;

use super::Cache;

#[derive(Clone)]
struct Entry {
    value: Arc<[u8]>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Cache with a maximum entry count and per-entry TTL.
pub struct BoundedCache {
    entries: MokaCache<String, Entry>,
}

impl BoundedCache {
    pub fn new(max_entries: u64) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { entries }
    }
}

impl Cache for BoundedCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|entry| entry.value.to_vec())
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        if ttl.is_zero() {
            self.entries.invalidate(key);
            return;
        }
        let entry = Entry {
            value: value.into(),
            ttl,
        };
        self.entries.insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries.invalidate(key);
    }

    fn clear(&self) {
        self.entries.invalidate_all();
    }

    fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }
}
