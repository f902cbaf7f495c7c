//! DNS cache
//!
//! Insertion-ordered, TTL-bounded map from `(host, port)` to resolved
//! addresses. Lookups deep-copy so entries can be evicted independently of
//! any outstanding user. One mutex guards the table; it is a leaf lock.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Default entry cap; the oldest entry is evicted beyond this.
pub const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, Clone)]
struct Entry {
    host: String,
    port: u16,
    addrs: Vec<SocketAddr>,
    expires: Instant,
}

/// Thread-safe DNS cache with FIFO eviction.
#[derive(Debug)]
pub struct DnsCache {
    entries: Mutex<VecDeque<Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl DnsCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            ttl,
            capacity,
        }
    }

    /// A live entry's addresses, deep-copied. Expired entries are never
    /// returned (and are dropped on sight).
    pub fn lookup(&self, host: &str, port: u16) -> Option<Vec<SocketAddr>> {
        let mut entries = self.lock();
        let now = Instant::now();
        let pos = entries
            .iter()
            .position(|e| e.port == port && e.host == host)?;
        if now >= entries[pos].expires {
            entries.remove(pos);
            return None;
        }
        Some(entries[pos].addrs.clone())
    }

    /// Insert or refresh an entry. A refresh keeps the entry's position in
    /// insertion order; when full, the oldest entry is evicted first.
    pub fn insert(&self, host: &str, port: u16, addrs: Vec<SocketAddr>) {
        let mut entries = self.lock();
        let expires = Instant::now() + self.ttl;
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.port == port && e.host == host)
        {
            existing.addrs = addrs;
            existing.expires = expires;
            return;
        }
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(Entry {
            host: host.to_string(),
            port,
            addrs,
            expires,
        });
    }

    /// Drop every expired entry.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.lock().retain(|e| now < e.expires);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for DnsCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, last], 443))
    }

    #[test]
    fn test_lookup_copies_entry() {
        let cache = DnsCache::default();
        cache.insert("example.test", 443, vec![addr(1)]);
        let first = cache.lookup("example.test", 443).expect("hit");
        let second = cache.lookup("example.test", 443).expect("hit");
        assert_eq!(first, second);
        assert_eq!(first, vec![addr(1)]);
    }

    #[test]
    fn test_port_distinguishes_entries() {
        let cache = DnsCache::default();
        cache.insert("example.test", 443, vec![addr(1)]);
        cache.insert("example.test", 8443, vec![addr(2)]);
        assert_eq!(cache.lookup("example.test", 443), Some(vec![addr(1)]));
        assert_eq!(cache.lookup("example.test", 8443), Some(vec![addr(2)]));
    }

    #[test]
    fn test_expired_entry_is_never_returned() {
        let cache = DnsCache::new(Duration::from_nanos(1), DEFAULT_CAPACITY);
        cache.insert("example.test", 443, vec![addr(1)]);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.lookup("example.test", 443), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let cache = DnsCache::new(DEFAULT_TTL, 3);
        cache.insert("a.test", 443, vec![addr(1)]);
        cache.insert("b.test", 443, vec![addr(2)]);
        cache.insert("c.test", 443, vec![addr(3)]);
        cache.insert("d.test", 443, vec![addr(4)]);
        assert_eq!(cache.lookup("a.test", 443), None);
        assert!(cache.lookup("b.test", 443).is_some());
        assert!(cache.lookup("d.test", 443).is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_refresh_does_not_duplicate() {
        let cache = DnsCache::default();
        cache.insert("a.test", 443, vec![addr(1)]);
        cache.insert("a.test", 443, vec![addr(2)]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("a.test", 443), Some(vec![addr(2)]));
    }

    #[test]
    fn test_cleanup_expired_retains_live() {
        let cache = DnsCache::new(Duration::from_secs(300), DEFAULT_CAPACITY);
        cache.insert("live.test", 443, vec![addr(1)]);
        cache.cleanup_expired();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
