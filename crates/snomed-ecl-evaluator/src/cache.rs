//! Resolver caching for ECL evaluation.
//!
//! Provides an LRU cache with TTL expiration holding [`ExpressionResolver`]s,
//! so repeated evaluations of an expression share its memoized results.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use snomed_ecl::EclExpression;
use tracing::debug;

use crate::config::CacheConfig;
use crate::form::LogicalForm;
use crate::resolver::ExpressionResolver;

type CacheKey = (String, LogicalForm);

/// A cached resolver with expiration tracking.
struct CacheEntry {
    resolver: ExpressionResolver,
    created_at: Instant,
}

impl CacheEntry {
    fn new(resolver: ExpressionResolver) -> Self {
        Self {
            resolver,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Thread-safe LRU cache with TTL expiration for expression resolvers.
///
/// Keys are the normalized expression text and the logical form. When the
/// cache is full the least recently used entry is evicted; expired entries
/// are replaced on the next lookup.
pub struct ResolverCache {
    inner: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ResolverCache {
    /// Creates a new cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_capacity(config.max_entries, config.ttl)
    }

    /// Creates a cache with custom capacity and TTL. A capacity of zero is
    /// treated as one.
    pub fn with_capacity(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns the live resolver for `expression` in `form`, creating and
    /// storing one with `create` on a miss.
    pub fn get_or_insert(
        &self,
        expression: &EclExpression,
        form: LogicalForm,
        create: impl FnOnce() -> ExpressionResolver,
    ) -> ExpressionResolver {
        let key = (normalize_cache_key(&expression.to_string()), form);
        let mut cache = self.inner.lock();

        if let Some(entry) = cache.get(&key) {
            if !entry.is_expired(self.ttl) {
                debug!(expression = %key.0, %form, "resolver cache hit");
                return entry.resolver.clone();
            }
        }

        let resolver = create();
        cache.put(key, CacheEntry::new(resolver.clone()));
        resolver
    }

    /// Removes the entry for the resolver's expression and form, but only
    /// while it still holds `resolver` itself. Returns true if an entry was
    /// removed.
    pub fn invalidate(&self, resolver: &ExpressionResolver) -> bool {
        let key = (
            normalize_cache_key(&resolver.expression().to_string()),
            resolver.form(),
        );
        let mut cache = self.inner.lock();
        if !cache
            .peek(&key)
            .is_some_and(|entry| entry.resolver.same_as(resolver))
        {
            return false;
        }
        cache.pop(&key);
        debug!(expression = %key.0, form = %key.1, "resolver evicted");
        true
    }

    /// Checks if a live entry exists (without affecting LRU order).
    pub fn contains(&self, expression: &EclExpression, form: LogicalForm) -> bool {
        let key = (normalize_cache_key(&expression.to_string()), form);
        self.inner
            .lock()
            .peek(&key)
            .is_some_and(|entry| !entry.is_expired(self.ttl))
    }

    /// Returns the number of entries currently in the cache.
    ///
    /// Note: This may include expired entries that haven't been cleaned up yet.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries from the cache.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Removes expired entries from the cache.
    pub fn cleanup_expired(&self) {
        let mut cache = self.inner.lock();
        let expired: Vec<CacheKey> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            cache.pop(&key);
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let cache = self.inner.lock();
        let total = cache.len();
        let expired = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .count();
        CacheStats {
            total_entries: total,
            expired_entries: expired,
            valid_entries: total.saturating_sub(expired),
        }
    }
}

impl std::fmt::Debug for ResolverCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ResolverCache")
            .field("entries", &stats.total_entries)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Statistics about the cache state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries in the cache.
    pub total_entries: usize,
    /// Number of expired entries (not yet cleaned up).
    pub expired_entries: usize,
    /// Number of valid (non-expired) entries.
    pub valid_entries: usize,
}

/// Collapses whitespace runs and trims, so equivalent renderings of an
/// expression map to the same key.
///
/// # Example
///
/// ```rust
/// use snomed_ecl_evaluator::normalize_cache_key;
///
/// assert_eq!(normalize_cache_key("<<  73211009"), "<< 73211009");
/// assert_eq!(normalize_cache_key(" < 100   AND < 200 "), "< 100 AND < 200");
/// ```
pub fn normalize_cache_key(ecl: &str) -> String {
    let mut result = String::with_capacity(ecl.len());
    let mut prev_was_space = true;

    for ch in ecl.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }

    if result.ends_with(' ') {
        result.pop();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use snomed_ecl_index::MemoryIndex;

    use crate::config::EvaluatorConfig;
    use crate::context::EvalContext;

    fn resolver(expression: &EclExpression, form: LogicalForm) -> ExpressionResolver {
        let ctx = EvalContext::new(
            Arc::new(MemoryIndex::new()),
            Arc::new(EvaluatorConfig::default()),
            form,
        );
        ExpressionResolver::new(ctx, Arc::new(expression.clone()))
    }

    fn concept(id: u64) -> EclExpression {
        EclExpression::descendant_or_self_of(EclExpression::concept(id))
    }

    fn insert(cache: &ResolverCache, expression: &EclExpression) -> ExpressionResolver {
        cache.get_or_insert(expression, LogicalForm::Inferred, || {
            resolver(expression, LogicalForm::Inferred)
        })
    }

    #[test]
    fn test_cache_new() {
        let cache = ResolverCache::new(CacheConfig::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_returns_the_stored_resolver() {
        let cache = ResolverCache::with_capacity(10, Duration::from_secs(300));
        let expression = concept(73211009);
        insert(&cache, &expression);

        let mut created = false;
        cache.get_or_insert(&expression, LogicalForm::Inferred, || {
            created = true;
            resolver(&expression, LogicalForm::Inferred)
        });
        assert!(!created);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_forms_are_cached_separately() {
        let cache = ResolverCache::with_capacity(10, Duration::from_secs(300));
        let expression = concept(73211009);
        insert(&cache, &expression);

        assert!(cache.contains(&expression, LogicalForm::Inferred));
        assert!(!cache.contains(&expression, LogicalForm::Stated));
    }

    #[test]
    fn test_invalidate_removes_only_the_same_resolver() {
        let cache = ResolverCache::with_capacity(10, Duration::from_secs(300));
        let expression = concept(73211009);
        let stored = insert(&cache, &expression);

        let stranger = resolver(&expression, LogicalForm::Inferred);
        assert!(!cache.invalidate(&stranger));
        assert!(cache.contains(&expression, LogicalForm::Inferred));

        assert!(cache.invalidate(&stored));
        assert!(!cache.contains(&expression, LogicalForm::Inferred));
        assert!(!cache.invalidate(&stored));

        let mut created = false;
        cache.get_or_insert(&expression, LogicalForm::Inferred, || {
            created = true;
            resolver(&expression, LogicalForm::Inferred)
        });
        assert!(created);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ResolverCache::with_capacity(2, Duration::from_secs(300));
        insert(&cache, &concept(1));
        insert(&cache, &concept(2));

        // Touch 1 so 2 becomes least recently used.
        insert(&cache, &concept(1));
        insert(&cache, &concept(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&concept(1), LogicalForm::Inferred));
        assert!(!cache.contains(&concept(2), LogicalForm::Inferred));
        assert!(cache.contains(&concept(3), LogicalForm::Inferred));
    }

    #[test]
    fn test_ttl_expiration() {
        let cache = ResolverCache::with_capacity(10, Duration::from_millis(50));
        insert(&cache, &concept(1));
        assert!(cache.contains(&concept(1), LogicalForm::Inferred));

        thread::sleep(Duration::from_millis(100));

        assert!(!cache.contains(&concept(1), LogicalForm::Inferred));
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        cache.cleanup_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_clear() {
        let cache = ResolverCache::with_capacity(10, Duration::from_secs(300));
        insert(&cache, &concept(1));
        insert(&cache, &concept(2));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_min_capacity() {
        let cache = ResolverCache::with_capacity(0, Duration::from_secs(300));
        insert(&cache, &concept(1));
        insert(&cache, &concept(2));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&concept(2), LogicalForm::Inferred));
    }

    #[test]
    fn test_normalize_cache_key_whitespace() {
        assert_eq!(normalize_cache_key("< 100   AND   < 200"), "< 100 AND < 200");
        assert_eq!(normalize_cache_key("<< 100\t"), "<< 100");
        assert_eq!(normalize_cache_key("   "), "");
    }

    #[test]
    fn test_cache_debug() {
        let cache = ResolverCache::with_capacity(10, Duration::from_secs(300));
        insert(&cache, &concept(1));
        let debug = format!("{:?}", cache);
        assert!(debug.contains("ResolverCache"));
        assert!(debug.contains("entries"));
    }
}
