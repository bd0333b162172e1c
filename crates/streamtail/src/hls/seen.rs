use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use url::Url;

/// Bounded membership set of segment URLs the poller has already handled.
///
/// Once full, the least recently used entry is evicted, so a URL that falls
/// out of the window would be treated as new again.
pub struct SegmentCache {
    inner: Cache<Url, ()>,
}

impl SegmentCache {
    pub fn new(capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { inner }
    }

    /// Whether `url` is in the set. Counts as a use for eviction purposes.
    pub fn seen(&self, url: &Url) -> bool {
        self.inner.get(url).is_some()
    }

    pub fn insert(&self, url: Url) {
        self.inner.insert(url, ());
    }

    #[cfg(test)]
    fn settle(&self) {
        self.inner.run_pending_tasks();
    }

    #[cfg(test)]
    fn len(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(n: u32) -> Url {
        Url::parse(&format!("https://edge.example.com/seg{n}.ts")).unwrap()
    }

    #[test]
    fn remembers_inserted_urls() {
        let cache = SegmentCache::new(16);
        assert!(!cache.seen(&seg(1)));
        cache.insert(seg(1));
        assert!(cache.seen(&seg(1)));
        assert!(!cache.seen(&seg(2)));
    }

    #[test]
    fn stays_within_capacity() {
        let cache = SegmentCache::new(8);
        for n in 0..64 {
            cache.insert(seg(n));
        }
        cache.settle();
        assert!(cache.len() <= 8);
        // The most recent insert survives eviction.
        assert!(cache.seen(&seg(63)));
    }
}
