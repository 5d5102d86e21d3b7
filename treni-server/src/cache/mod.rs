//! TTL-tiered caching for upstream API responses.
//!
//! A [`Cache`] is a plain key → bytes store with per-entry expiry. It is
//! constructed once at startup and shared as `Arc<dyn Cache>`; there is no
//! process-wide cache. [`CachedClient`] sits in front of a [`TransitApi`]
//! and picks the TTL for each operation from its [`TtlClass`].
//!
//! [`TransitApi`]: crate::viaggiatreno::TransitApi

mod bounded;
mod client;
mod memory;

use std::time::Duration;

pub use bounded::BoundedCache;
pub use client::{CachedClient, cache_key, minute_key};
pub use memory::MemoryCache;

/// Expiring key → bytes store.
///
/// Implementations must be safe to share between any number of tasks. A
/// `get` on an expired entry behaves as a miss. A zero TTL means the entry
/// is never observable.
pub trait Cache: Send + Sync {
    /// Look up a live entry.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Insert or replace an entry together with its expiry.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);

    fn delete(&self, key: &str);

    fn clear(&self);

    /// Number of stored entries (expired ones may still be counted until
    /// they are next read).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How quickly the data behind an operation goes out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlClass {
    /// Station topology.
    Static,
    /// Train number → origin resolution.
    SemiStatic,
    /// Boards and journey status.
    Realtime,
}

/// TTL for each [`TtlClass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlConfig {
    pub static_ttl: Duration,
    pub semi_static_ttl: Duration,
    pub realtime_ttl: Duration,
}

impl TtlConfig {
    pub fn ttl(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Static => self.static_ttl,
            TtlClass::SemiStatic => self.semi_static_ttl,
            TtlClass::Realtime => self.realtime_ttl,
        }
    }

    pub fn with_static_ttl(mut self, ttl: Duration) -> Self {
        self.static_ttl = ttl;
        self
    }

    pub fn with_semi_static_ttl(mut self, ttl: Duration) -> Self {
        self.semi_static_ttl = ttl;
        self
    }

    pub fn with_realtime_ttl(mut self, ttl: Duration) -> Self {
        self.realtime_ttl = ttl;
        self
    }
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            static_ttl: Duration::from_secs(24 * 60 * 60),
            semi_static_ttl: Duration::from_secs(60 * 60),
            realtime_ttl: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttls() {
        let ttl = TtlConfig::default();
        assert_eq!(ttl.ttl(TtlClass::Static), Duration::from_secs(86_400));
        assert_eq!(ttl.ttl(TtlClass::SemiStatic), Duration::from_secs(3_600));
        assert_eq!(ttl.ttl(TtlClass::Realtime), Duration::from_secs(30));
    }

    #[test]
    fn ttl_builder() {
        let ttl = TtlConfig::default().with_realtime_ttl(Duration::from_secs(5));
        assert_eq!(ttl.ttl(TtlClass::Realtime), Duration::from_secs(5));
        assert_eq!(ttl.ttl(TtlClass::Static), Duration::from_secs(86_400));
    }
}
