//! Bounded caches and cleanup scheduling.
//!
//! Visualization keeps several caches (selected annotations, built layers,
//! converted geometry). Each is an [`LruCache`] bounded by entry count and by
//! an estimated byte size. A [`MemoryManager`] counts expensive operations
//! and says when the caches should be trimmed.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use web_time::Instant;

const BYTES_PER_MB: usize = 1024 * 1024;

struct CacheEntry<V> {
    value: V,
    size: usize,
    last_used: u64,
}

/// Least-recently-used cache with count and byte limits.
pub struct LruCache<K, V> {
    max_entries: usize,
    max_bytes: usize,
    entries: HashMap<K, CacheEntry<V>>,
    memory_usage: usize,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Create a cache holding at most `max_entries` values and `max_memory_mb` MB.
    pub fn new(max_entries: usize, max_memory_mb: usize) -> Self {
        Self::with_byte_limit(max_entries, max_memory_mb.saturating_mul(BYTES_PER_MB))
    }

    pub fn with_byte_limit(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
            entries: HashMap::new(),
            memory_usage: 0,
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Look up a value and mark it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_used = tick;
        Some(&entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a value with its estimated size, evicting old entries as needed.
    ///
    /// The newest entry is never evicted by its own insertion, even if it alone
    /// exceeds the byte limit.
    pub fn put(&mut self, key: K, value: V, size_bytes: usize) {
        let last_used = self.next_tick();
        if let Some(old) = self.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                size: size_bytes,
                last_used,
            },
        ) {
            self.memory_usage -= old.size;
        }
        self.memory_usage += size_bytes;
        self.enforce_limits(&key);
    }

    fn enforce_limits(&mut self, keep: &K) {
        while self.entries.len() > self.max_entries || self.memory_usage > self.max_bytes {
            let oldest = self
                .entries
                .iter()
                .filter(|(key, _)| *key != keep)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());

            let Some(oldest) = oldest else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.memory_usage -= evicted.size;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.memory_usage = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the estimated sizes of all cached entries.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }
}

/// Snapshot of cache and cleanup bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub cache_entries: usize,
    pub cache_size_bytes: usize,
    pub cleanup_count: u64,
    pub operations_since_cleanup: u32,
}

/// Decides when caches should be trimmed.
///
/// Every `gc_threshold` operations the manager checks whether the caches are
/// over the memory limit or whether the last cleanup is older than
/// [`MemoryManager::CLEANUP_INTERVAL`].
#[derive(Debug)]
pub struct MemoryManager {
    gc_threshold: u32,
    memory_limit_bytes: usize,
    operation_count: u32,
    last_cleanup: Instant,
    cleanup_count: u64,
}

impl MemoryManager {
    /// Cleanup is suggested at least this often while operations continue.
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

    pub fn new(gc_threshold: u32, memory_limit_mb: usize) -> Self {
        Self {
            gc_threshold: gc_threshold.max(1),
            memory_limit_bytes: memory_limit_mb.saturating_mul(BYTES_PER_MB),
            operation_count: 0,
            last_cleanup: Instant::now(),
            cleanup_count: 0,
        }
    }

    /// Change the operation threshold (minimum 1).
    pub fn configure(&mut self, gc_threshold: u32) {
        self.gc_threshold = gc_threshold.max(1);
    }

    pub fn gc_threshold(&self) -> u32 {
        self.gc_threshold
    }

    /// Count one operation. Returns true when the caches should be trimmed.
    pub fn trigger_operation(&mut self, cache_bytes: usize) -> bool {
        self.operation_count += 1;
        if self.operation_count < self.gc_threshold {
            return false;
        }
        self.operation_count = 0;

        let over_limit = cache_bytes > self.memory_limit_bytes;
        let stale = self.last_cleanup.elapsed() > Self::CLEANUP_INTERVAL;
        if over_limit {
            log::debug!(
                "Caches use {} bytes, limit is {} bytes",
                cache_bytes,
                self.memory_limit_bytes
            );
        }
        over_limit || stale
    }

    /// Note that the caches were trimmed.
    pub fn record_cleanup(&mut self) {
        self.last_cleanup = Instant::now();
        self.cleanup_count += 1;
        log::debug!("Memory cleanup #{} completed", self.cleanup_count);
    }

    pub fn stats(&self, cache_entries: usize, cache_size_bytes: usize) -> MemoryStats {
        MemoryStats {
            cache_entries,
            cache_size_bytes,
            cleanup_count: self.cleanup_count,
            operations_since_cleanup: self.operation_count,
        }
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(50, 512)
    }
}

/// Times an operation and logs it when it was slow.
///
/// ```ignore
/// let _tracker = ResourceTracker::new("refresh_visualization");
/// // ... work ...
/// ```
pub struct ResourceTracker {
    operation: &'static str,
    start: Instant,
}

impl ResourceTracker {
    /// Operations slower than this are logged at info level.
    pub const SLOW_THRESHOLD: Duration = Duration::from_secs(1);

    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        if duration > Self::SLOW_THRESHOLD {
            log::info!(
                "Operation '{}' took {:.2}s",
                self.operation,
                duration.as_secs_f64()
            );
        } else {
            log::trace!("Operation '{}' took {:?}", self.operation, duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut cache = LruCache::with_byte_limit(2, usize::MAX);
        cache.put("a", 1, 0);
        cache.put("b", 2, 0);
        assert_eq!(cache.get(&"a"), Some(&1));

        cache.put("c", 3, 0);
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_byte_accounting() {
        let mut cache = LruCache::with_byte_limit(10, 100);
        cache.put(1, "x", 40);
        cache.put(2, "y", 40);
        assert_eq!(cache.memory_usage(), 80);

        // replacing an entry swaps its size
        cache.put(2, "y2", 10);
        assert_eq!(cache.memory_usage(), 50);

        cache.put(3, "z", 60);
        assert!(!cache.contains(&1));
        assert_eq!(cache.memory_usage(), 70);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_oversized_entry_is_kept() {
        let mut cache = LruCache::with_byte_limit(10, 10);
        cache.put(1, (), 5);
        cache.put(2, (), 50);
        assert!(cache.contains(&2));
        assert!(!cache.contains(&1));
    }

    #[test]
    fn test_manager_threshold() {
        let mut manager = MemoryManager::new(3, 1);
        assert!(!manager.trigger_operation(0));
        assert!(!manager.trigger_operation(0));
        // threshold reached, but neither over limit nor stale
        assert!(!manager.trigger_operation(0));

        assert!(!manager.trigger_operation(2 * BYTES_PER_MB));
        assert!(!manager.trigger_operation(2 * BYTES_PER_MB));
        assert!(manager.trigger_operation(2 * BYTES_PER_MB));

        manager.record_cleanup();
        let stats = manager.stats(4, 128);
        assert_eq!(stats.cleanup_count, 1);
        assert_eq!(stats.operations_since_cleanup, 0);
        assert_eq!(stats.cache_entries, 4);
    }

    #[test]
    fn test_threshold_has_minimum_of_one() {
        let mut manager = MemoryManager::new(0, 0);
        assert_eq!(manager.gc_threshold(), 1);
        assert!(manager.trigger_operation(1));
        manager.configure(0);
        assert_eq!(manager.gc_threshold(), 1);
    }
}
