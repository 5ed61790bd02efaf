use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

use crate::store::Store;

pub const CACHE_STORAGE_KEY: &str = "bypass_cache";

/// Seven days in milliseconds.
pub const CACHE_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Source of "now" in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub service: String,
    pub timestamp: i64,
    pub successful: bool,
}

impl CacheEntry {
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp) < CACHE_TTL_MS
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedService {
    pub service: String,
    pub successful: bool,
}

/// Remembers, per exact URL, which service was last used and whether it worked.
pub struct ResultCache {
    entries: HashMap<String, CacheEntry>,
    store: Rc<dyn Store>,
    clock: Rc<dyn Clock>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ResultCache {
    /// Load the persisted snapshot, dropping expired entries before they
    /// become visible.
    pub fn load(store: Rc<dyn Store>, clock: Rc<dyn Clock>) -> Self {
        let entries = match store.get(CACHE_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&raw) {
                Ok(parsed) => {
                    let now = clock.now_ms();
                    let stored = parsed.len();
                    let valid: HashMap<String, CacheEntry> = parsed
                        .into_iter()
                        .filter(|(_, entry)| entry.is_fresh(now))
                        .collect();
                    info!(
                        action = "loaded",
                        component = "result_cache",
                        entry_count = valid.len(),
                        expired = stored - valid.len(),
                        "Loaded cache snapshot"
                    );
                    valid
                }
                Err(e) => {
                    warn!(action = "parse", component = "result_cache", error = %e, "Discarding malformed cache snapshot");
                    HashMap::new()
                }
            },
            Ok(None) => HashMap::new(),
            Err(e) => {
                error!(action = "load", component = "result_cache", error = %e, "Failed to load cache from store");
                HashMap::new()
            }
        };

        Self {
            entries,
            store,
            clock,
        }
    }

    pub fn cached_service(&self, url: &str) -> Option<CachedService> {
        let now = self.clock.now_ms();
        self.entries
            .get(url)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| CachedService {
                service: entry.service.clone(),
                successful: entry.successful,
            })
    }

    /// Full entry for display, subject to the same expiry rule as lookups.
    pub fn entry(&self, url: &str) -> Option<&CacheEntry> {
        let now = self.clock.now_ms();
        self.entries.get(url).filter(|entry| entry.is_fresh(now))
    }

    pub fn cache_url(&mut self, url: &str, service: &str, successful: bool) {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                service: service.to_string(),
                timestamp: self.clock.now_ms(),
                successful,
            },
        );
        debug!(action = "insert", component = "result_cache", url, service, successful, "Cached result");
        self.persist();
    }

    pub fn clear(&mut self) {
        let cleared = self.entries.len();
        self.entries.clear();
        if let Err(e) = self.store.remove(CACHE_STORAGE_KEY) {
            error!(action = "clear", component = "result_cache", error = %e, "Failed to remove cache from store");
        }
        info!(action = "clear", component = "result_cache", cleared, "Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.entries)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(CACHE_STORAGE_KEY, &json));
        if let Err(e) = result {
            error!(action = "save", component = "result_cache", error = %e, "Failed to save cache to store");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::tests::ReadOnlyStore;
    use crate::store::MemoryStore;
    use std::cell::Cell;

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub(crate) struct ManualClock(pub(crate) Cell<i64>);

    impl ManualClock {
        pub(crate) fn new(start: i64) -> Self {
            Self(Cell::new(start))
        }

        pub(crate) fn advance(&self, ms: i64) {
            self.0.set(self.0.get() + ms);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.0.get()
        }
    }

    const START: i64 = 1_700_000_000_000;

    fn cache() -> (ResultCache, Rc<MemoryStore>, Rc<ManualClock>) {
        let store = Rc::new(MemoryStore::new());
        let clock = Rc::new(ManualClock::new(START));
        (ResultCache::load(store.clone(), clock.clone()), store, clock)
    }

    #[test]
    fn hit_then_expiry() {
        let (mut cache, _, clock) = cache();
        cache.cache_url("http://a.com/1", "12ft", true);
        assert_eq!(
            cache.cached_service("http://a.com/1"),
            Some(CachedService {
                service: "12ft".to_string(),
                successful: true
            })
        );

        clock.advance(CACHE_TTL_MS - 1);
        assert!(cache.cached_service("http://a.com/1").is_some());

        clock.advance(2);
        assert_eq!(cache.cached_service("http://a.com/1"), None);
        // Expired entries stay in memory until the next load
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lookup_is_exact_string() {
        let (mut cache, _, _) = cache();
        cache.cache_url("https://www.nytimes.com/a", "12ft", true);
        assert!(cache.cached_service("https://nytimes.com/a").is_none());
        assert!(cache.cached_service("https://www.nytimes.com/a/").is_none());
    }

    #[test]
    fn last_write_wins() {
        let (mut cache, _, clock) = cache();
        cache.cache_url("https://ft.com/x", "archive.is", true);
        clock.advance(1_000);
        cache.cache_url("https://ft.com/x", "12ft", false);

        let entry = cache.entry("https://ft.com/x").unwrap();
        assert_eq!(entry.service, "12ft");
        assert!(!entry.successful);
        assert_eq!(entry.timestamp, START + 1_000);
    }

    #[test]
    fn clear_removes_entries_and_snapshot() {
        let (mut cache, store, _) = cache();
        cache.cache_url("http://a.com/1", "12ft", true);
        assert!(store.contains(CACHE_STORAGE_KEY));

        cache.clear();
        assert!(cache.cached_service("http://a.com/1").is_none());
        assert!(cache.is_empty());
        assert!(!store.contains(CACHE_STORAGE_KEY));
    }

    #[test]
    fn load_prunes_expired_entries() {
        let store = Rc::new(MemoryStore::new());
        let snapshot = serde_json::json!({
            "https://old.com/": {"service": "12ft", "timestamp": START - CACHE_TTL_MS, "successful": true},
            "https://new.com/": {"service": "scribe", "timestamp": START - 5, "successful": false}
        });
        store.set(CACHE_STORAGE_KEY, &snapshot.to_string()).unwrap();

        let cache = ResultCache::load(store, Rc::new(ManualClock::new(START)));
        assert_eq!(cache.len(), 1);
        assert!(cache.cached_service("https://old.com/").is_none());
        assert_eq!(
            cache.cached_service("https://new.com/"),
            Some(CachedService {
                service: "scribe".to_string(),
                successful: false
            })
        );
    }

    #[test]
    fn load_drops_entries_with_extreme_timestamps() {
        let store = Rc::new(MemoryStore::new());
        let snapshot = serde_json::json!({
            "https://a.com/": {"service": "12ft", "timestamp": i64::MIN, "successful": true},
            "https://b.com/": {"service": "12ft", "timestamp": START, "successful": true}
        });
        store.set(CACHE_STORAGE_KEY, &snapshot.to_string()).unwrap();

        let cache = ResultCache::load(store, Rc::new(ManualClock::new(START)));
        assert_eq!(cache.len(), 1);
        assert!(cache.cached_service("https://a.com/").is_none());
        assert!(cache.cached_service("https://b.com/").is_some());
    }

    #[test]
    fn reload_sees_persisted_entries() {
        let (mut cache, store, clock) = cache();
        cache.cache_url("https://wsj.com/a", "archive.ph", true);

        let reloaded = ResultCache::load(store, clock);
        assert!(reloaded.cached_service("https://wsj.com/a").is_some());
    }

    #[test]
    fn malformed_snapshot_starts_empty() {
        let store = Rc::new(MemoryStore::new());
        store.set(CACHE_STORAGE_KEY, "[1, 2").unwrap();
        let cache = ResultCache::load(store, Rc::new(ManualClock::new(START)));
        assert!(cache.is_empty());
    }

    #[test]
    fn write_failure_keeps_in_memory_entry() {
        let store = Rc::new(ReadOnlyStore::default());
        let mut cache = ResultCache::load(store, Rc::new(ManualClock::new(START)));
        cache.cache_url("https://a.com/", "12ft", true);
        assert!(cache.cached_service("https://a.com/").is_some());
        cache.clear();
        assert!(cache.is_empty());
    }
}
