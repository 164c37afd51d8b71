//! Process-lifetime memoization of engine results.
//!
//! Entries are keyed by the dataset fingerprint, an operation name and the
//! serialized operation arguments. There is no eviction policy: the number
//! of distinct keys is bounded by what one session can ask for, and a
//! session clears the cache when it loads a different dataset.

use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::data::model::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: Fingerprint,
    pub operation: &'static str,
    pub arguments: String,
}

impl CacheKey {
    pub fn new(dataset: Fingerprint, operation: &'static str, arguments: impl Into<String>) -> Self {
        Self {
            dataset,
            operation,
            arguments: arguments.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Thread-safe memo table. Values are stored behind `Arc` and inserted only
/// once their computation has finished, so a reader sees either no entry or
/// a complete one.
#[derive(Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored value for `key`, or run `compute` and store it.
    pub fn memoize<T, F>(&self, key: CacheKey, compute: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        match self.try_memoize(key, || Ok::<T, Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`memoize`](Self::memoize) for fallible computations. Errors
    /// are returned to the caller and never stored.
    pub fn try_memoize<T, E, F>(&self, key: CacheKey, compute: F) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.lookup::<T>(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "cache hit: {} on {} {}",
                key.operation,
                key.dataset.short(),
                key.arguments
            );
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "cache miss: {} on {} {}",
            key.operation,
            key.dataset.short(),
            key.arguments
        );
        let value = Arc::new(compute()?);

        // If another caller stored the same key meanwhile, keep the first.
        let stored = Arc::clone(
            self.lock()
                .entry(key)
                .or_insert_with(|| Arc::clone(&value) as Entry),
        );
        Ok(stored.downcast::<T>().unwrap_or(value))
    }

    fn lookup<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let entry = self.lock().get(key).cloned()?;
        entry.downcast::<T>().ok()
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

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        // `compute` never runs under the lock, so a poisoned map is intact.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Dataset;
    use std::cell::Cell;

    fn fingerprint(n: &str) -> Fingerprint {
        Dataset::from_text_rows(vec![n.to_string()], Vec::new()).unwrap().fingerprint()
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let cache = ResultCache::new();
        let calls = Cell::new(0);
        let key = CacheKey::new(fingerprint("a"), "op", "args");
        let compute = || {
            calls.set(calls.get() + 1);
            42u32
        };
        assert_eq!(*cache.memoize(key.clone(), compute), 42);
        assert_eq!(*cache.memoize(key, compute), 42);
        assert_eq!(calls.get(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn keys_differ_by_every_component() {
        let cache = ResultCache::new();
        let a = fingerprint("a");
        let b = fingerprint("b");
        cache.memoize(CacheKey::new(a, "op", "x"), || 1u8);
        cache.memoize(CacheKey::new(b, "op", "x"), || 2u8);
        cache.memoize(CacheKey::new(a, "other", "x"), || 3u8);
        cache.memoize(CacheKey::new(a, "op", "y"), || 4u8);
        assert_eq!(cache.len(), 4);
        assert_eq!(*cache.memoize(CacheKey::new(b, "op", "x"), || 0u8), 2);
    }

    #[test]
    fn errors_are_not_stored() {
        let cache = ResultCache::new();
        let key = CacheKey::new(fingerprint("a"), "op", "");
        let failed: Result<Arc<u8>, &str> = cache.try_memoize(key.clone(), || Err("boom"));
        assert!(failed.is_err());
        assert!(cache.is_empty());
        let ok: Result<Arc<u8>, &str> = cache.try_memoize(key, || Ok(7));
        assert_eq!(*ok.unwrap(), 7);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = ResultCache::new();
        cache.memoize(CacheKey::new(fingerprint("a"), "op", "1"), || 1u8);
        cache.memoize(CacheKey::new(fingerprint("b"), "op", "1"), || 2u8);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(*cache.memoize(CacheKey::new(fingerprint("a"), "op", "1"), || 9u8), 9);
    }
}
