//! Request-scoped relation caches.
//!
//! A [`RequestScope`] bounds one logical request. It owns two independent
//! [`CacheRegistry`] tables (soft and hard) that share lazy collections
//! between records resolved within the same request. Entries are never
//! expired: the caller opens a scope at the start of the request and
//! disposes of it at the end.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::models::{CacheConfig, CacheKind, LazyCollection, Model, RepositoryId};

/// Hit/miss counters for one registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the registry (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry {
    params: Option<Value>,
    collection: Box<dyn Any + Send + Sync>,
}

impl CacheEntry {
    /// The stored handle when it serves `T` and has not failed.
    fn collection<T: Model>(&self) -> Option<&LazyCollection<T>> {
        self.collection
            .downcast_ref::<LazyCollection<T>>()
            .filter(|collection| !collection.is_failed())
    }
}

/// Entries of one registry with a running count.
#[derive(Default)]
struct Entries {
    buckets: HashMap<RepositoryId, Vec<CacheEntry>>,
    len: usize,
    /// Set once the count passes the warning threshold; cleared when it
    /// falls back under it.
    over_threshold: bool,
}

impl Entries {
    fn lookup<T: Model>(
        &mut self,
        repository: RepositoryId,
        params: Option<&Value>,
    ) -> Option<LazyCollection<T>> {
        let bucket = self.buckets.get_mut(&repository)?;
        let position = bucket.iter().position(|entry| {
            entry.params.as_ref() == params && entry.collection.is::<LazyCollection<T>>()
        })?;

        if let Some(collection) = bucket[position].collection::<T>() {
            return Some(collection.clone());
        }

        // completed with an error: never serve it again
        bucket.swap_remove(position);
        self.len -= 1;
        None
    }

    /// Store `collection`, replacing an entry with the same key. Returns
    /// true when this insert crossed `threshold`.
    fn store<T: Model>(
        &mut self,
        repository: RepositoryId,
        params: Option<Value>,
        collection: LazyCollection<T>,
        threshold: usize,
    ) -> bool {
        let bucket = self.buckets.entry(repository).or_default();
        let before = bucket.len();
        bucket.retain(|entry| {
            entry.params != params || !entry.collection.is::<LazyCollection<T>>()
        });
        let replaced = before - bucket.len();
        bucket.push(CacheEntry {
            params,
            collection: Box::new(collection),
        });
        self.len = self.len + 1 - replaced;

        if self.len <= threshold {
            self.over_threshold = false;
            return false;
        }
        !std::mem::replace(&mut self.over_threshold, true)
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
        self.over_threshold = false;
    }
}

/// Lazy collections keyed by repository instance and resolved params.
///
/// Params are compared by structural equality. For a key present in the
/// registry every lookup returns the same handle, so at most one fetch per
/// (repository, params) is in flight.
pub struct CacheRegistry {
    kind: CacheKind,
    entries: Mutex<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
    warn_threshold: usize,
}

impl CacheRegistry {
    /// Create a registry with the default growth warning threshold.
    pub fn new(kind: CacheKind) -> Self {
        Self::with_threshold(kind, CacheConfig::default().registry_warn_threshold)
    }

    /// Create a registry that warns once its entry count passes `warn_threshold`.
    pub fn with_threshold(kind: CacheKind, warn_threshold: usize) -> Self {
        Self {
            kind,
            entries: Mutex::new(Entries::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            warn_threshold,
        }
    }

    /// Which cache this registry backs.
    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    /// The handle registered for `(repository, params)`, if any.
    ///
    /// Handles that completed with an error are evicted instead of returned.
    pub fn find_cache<T: Model>(
        &self,
        repository: RepositoryId,
        params: Option<&Value>,
    ) -> Option<LazyCollection<T>> {
        let found = self.lock().lookup::<T>(repository, params);
        self.record_lookup(found.is_some());
        found
    }

    /// Register `collection` under `(repository, params)` and return it.
    ///
    /// An existing entry for the same key is replaced.
    pub fn add_cache<T: Model>(
        &self,
        repository: RepositoryId,
        params: Option<Value>,
        collection: LazyCollection<T>,
    ) -> LazyCollection<T> {
        let mut entries = self.lock();
        self.store(&mut entries, repository, params, collection.clone());
        collection
    }

    /// Look up `(repository, params)`, registering the handle produced by
    /// `fetch` on a miss. Lookup and registration happen under one lock.
    pub fn find_or_add_with<T, E, F>(
        &self,
        repository: RepositoryId,
        params: Option<Value>,
        fetch: F,
    ) -> Result<LazyCollection<T>, E>
    where
        T: Model,
        F: FnOnce() -> Result<LazyCollection<T>, E>,
    {
        let mut entries = self.lock();
        if let Some(found) = entries.lookup::<T>(repository, params.as_ref()) {
            self.record_lookup(true);
            debug!(kind = %self.kind, repository = %repository, "request cache hit");
            return Ok(found);
        }

        self.record_lookup(false);
        debug!(kind = %self.kind, repository = %repository, "request cache miss");
        let collection = fetch()?;
        self.store(&mut entries, repository, params, collection.clone());
        Ok(collection)
    }

    fn store<T: Model>(
        &self,
        entries: &mut Entries,
        repository: RepositoryId,
        params: Option<Value>,
        collection: LazyCollection<T>,
    ) {
        if entries.store(repository, params, collection, self.warn_threshold) {
            warn!(
                kind = %self.kind,
                entries = entries.len,
                threshold = self.warn_threshold,
                "request cache registry is growing; is the request scope disposed?"
            );
        }
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Current counters and entry count.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One logical request.
pub struct RequestScope {
    id: Uuid,
    opened_at: DateTime<Utc>,
    soft: CacheRegistry,
    hard: CacheRegistry,
}

impl RequestScope {
    /// Open a scope with the default cache configuration.
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    /// Open a scope with `config`.
    pub fn with_config(config: &CacheConfig) -> Self {
        let scope = Self {
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
            soft: CacheRegistry::with_threshold(CacheKind::Soft, config.registry_warn_threshold),
            hard: CacheRegistry::with_threshold(CacheKind::Hard, config.registry_warn_threshold),
        };
        debug!(scope_id = %scope.id, "request scope opened");
        scope
    }

    /// Unique id of this scope, used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the scope was opened.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// The soft cache registry.
    pub fn soft(&self) -> &CacheRegistry {
        &self.soft
    }

    /// The hard cache registry.
    pub fn hard(&self) -> &CacheRegistry {
        &self.hard
    }

    /// The registry for `kind`.
    pub fn registry(&self, kind: CacheKind) -> &CacheRegistry {
        match kind {
            CacheKind::Soft => &self.soft,
            CacheKind::Hard => &self.hard,
        }
    }

    /// End the request: drop every cached entry and report statistics.
    pub fn dispose(self) -> ScopeReport {
        let report = ScopeReport {
            scope_id: self.id,
            duration_ms: (Utc::now() - self.opened_at).num_milliseconds(),
            soft: self.soft.stats(),
            hard: self.hard.stats(),
        };
        self.soft.clear();
        self.hard.clear();

        info!(
            scope_id = %report.scope_id,
            duration_ms = report.duration_ms,
            soft_hits = report.soft.hits,
            soft_misses = report.soft.misses,
            hard_hits = report.hard.hits,
            hard_misses = report.hard.misses,
            "request scope disposed"
        );
        report
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics of a disposed request scope.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub scope_id: Uuid,
    pub duration_ms: i64,
    pub soft: CacheStats,
    pub hard: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::RepositoryError;
    use crate::domain::models::Record;
    use serde_json::json;

    struct Book {
        id: Option<String>,
    }

    struct Author {
        id: Option<String>,
    }

    impl Model for Book {
        const NAME: &'static str = "book";

        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }
    }

    impl Model for Author {
        const NAME: &'static str = "author";

        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }
    }

    struct BookRepository;
    struct AuthorRepository;

    fn books() -> LazyCollection<Book> {
        LazyCollection::ready(vec![Record::new(Book { id: Some("b1".into()) })])
    }

    #[test]
    fn test_find_returns_registered_handle() {
        let registry = CacheRegistry::new(CacheKind::Soft);
        let repo = RepositoryId::new::<BookRepository>();
        let params = json!({"clientId": "c1", "tags": ["a", "b"]});

        assert!(registry.find_cache::<Book>(repo, Some(&params)).is_none());

        let stored = registry.add_cache(repo, Some(params.clone()), books());
        let found = registry.find_cache::<Book>(repo, Some(&params)).unwrap();

        assert!(found.same_handle(&stored));
        assert_eq!(registry.stats(), CacheStats { hits: 1, misses: 1, entries: 1 });
    }

    #[test]
    fn test_params_compared_structurally() {
        let registry = CacheRegistry::new(CacheKind::Soft);
        let repo = RepositoryId::new::<BookRepository>();

        let stored = registry.add_cache(repo, Some(json!({"a": 1, "b": [1, 2]})), books());
        let found = registry
            .find_cache::<Book>(repo, Some(&json!({"b": [1, 2], "a": 1})))
            .unwrap();
        assert!(found.same_handle(&stored));

        assert!(registry.find_cache::<Book>(repo, Some(&json!({"a": 2}))).is_none());
        assert!(registry.find_cache::<Book>(repo, None).is_none());
    }

    #[test]
    fn test_none_params_is_its_own_key() {
        let registry = CacheRegistry::new(CacheKind::Hard);
        let repo = RepositoryId::new::<BookRepository>();

        let stored = registry.add_cache(repo, None, books());
        assert!(registry.find_cache::<Book>(repo, None).unwrap().same_handle(&stored));
        assert!(registry.find_cache::<Book>(repo, Some(&Value::Null)).is_none());
    }

    #[test]
    fn test_repository_identity_separates_entries() {
        let registry = CacheRegistry::new(CacheKind::Soft);
        let books_repo = RepositoryId::new::<BookRepository>();
        registry.add_cache(books_repo, None, books());

        assert!(registry
            .find_cache::<Book>(RepositoryId::new::<AuthorRepository>(), None)
            .is_none());
        assert!(registry.find_cache::<Author>(books_repo, None).is_none());
        assert!(registry.find_cache::<Book>(books_repo, None).is_some());
    }

    #[test]
    fn test_instances_of_one_type_do_not_share() {
        let registry = CacheRegistry::new(CacheKind::Soft);
        let first = RepositoryId::new::<BookRepository>();
        let second = RepositoryId::new::<BookRepository>();

        let stored = registry.add_cache(first, Some(json!({"id": "b1"})), books());
        assert!(registry
            .find_cache::<Book>(second, Some(&json!({"id": "b1"})))
            .is_none());
        assert!(registry
            .find_cache::<Book>(first, Some(&json!({"id": "b1"})))
            .unwrap()
            .same_handle(&stored));
    }

    #[test]
    fn test_threshold_crossing_reported_once() {
        let repo = RepositoryId::new::<BookRepository>();
        let mut entries = Entries::default();

        assert!(!entries.store(repo, Some(json!(1)), books(), 2));
        assert!(!entries.store(repo, Some(json!(2)), books(), 2));
        assert!(entries.store(repo, Some(json!(3)), books(), 2));
        assert!(!entries.store(repo, Some(json!(4)), books(), 2));
        // replacing an entry does not grow the count
        assert!(!entries.store(repo, Some(json!(4)), books(), 2));
        assert_eq!(entries.len, 4);

        entries.clear();
        assert_eq!(entries.len, 0);
        for n in 0..2 {
            assert!(!entries.store(repo, Some(json!(n)), books(), 2));
        }
        assert!(entries.store(repo, Some(json!(2)), books(), 2));
    }

    #[test]
    fn test_add_replaces_same_key() {
        let registry = CacheRegistry::new(CacheKind::Soft);
        let repo = RepositoryId::new::<BookRepository>();

        registry.add_cache(repo, None, books());
        let second = registry.add_cache(repo, None, books());

        assert_eq!(registry.len(), 1);
        assert!(registry.find_cache::<Book>(repo, None).unwrap().same_handle(&second));
    }

    #[test]
    fn test_find_or_add_fetches_once() {
        let registry = CacheRegistry::new(CacheKind::Soft);
        let repo = RepositoryId::new::<BookRepository>();
        let mut fetches = 0;

        let first = registry
            .find_or_add_with::<Book, RepositoryError, _>(repo, None, || {
                fetches += 1;
                Ok(books())
            })
            .unwrap();
        let second = registry
            .find_or_add_with::<Book, RepositoryError, _>(repo, None, || {
                fetches += 1;
                Ok(books())
            })
            .unwrap();

        assert_eq!(fetches, 1);
        assert!(first.same_handle(&second));
    }

    #[test]
    fn test_find_or_add_does_not_store_on_error() {
        let registry = CacheRegistry::new(CacheKind::Hard);
        let repo = RepositoryId::new::<BookRepository>();

        let result = registry.find_or_add_with::<Book, &str, _>(repo, None, || Err("no repository"));
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_entry_is_evicted() {
        let registry = CacheRegistry::new(CacheKind::Soft);
        let repo = RepositoryId::new::<BookRepository>();
        let failed = registry.add_cache(
            repo,
            None,
            LazyCollection::<Book>::failed(RepositoryError::UpstreamFetch {
                resource: "book",
                message: "timeout".into(),
            }),
        );

        // still pending: served
        assert!(registry.find_cache::<Book>(repo, None).is_some());

        assert!(failed.await.is_err());
        assert!(registry.find_cache::<Book>(repo, None).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_scope_registries_are_independent() {
        let scope = RequestScope::new();
        let repo = RepositoryId::new::<BookRepository>();

        scope.soft().add_cache(repo, None, books());
        assert!(scope.hard().find_cache::<Book>(repo, None).is_none());
        assert!(scope.registry(CacheKind::Soft).find_cache::<Book>(repo, None).is_some());

        scope.hard().add_cache(repo, Some(json!({"x": 1})), books());
        assert!(scope.soft().find_cache::<Book>(repo, Some(&json!({"x": 1}))).is_none());
    }

    #[test]
    fn test_dispose_reports_and_clears() {
        let scope = RequestScope::with_config(&CacheConfig {
            registry_warn_threshold: 1,
        });
        let repo = RepositoryId::new::<BookRepository>();

        scope.soft().add_cache(repo, Some(json!(1)), books());
        scope.soft().add_cache(repo, Some(json!(2)), books());
        scope.soft().find_cache::<Book>(repo, Some(&json!(1)));

        let report = scope.dispose();
        assert_eq!(report.soft.entries, 2);
        assert_eq!(report.soft.hits, 1);
        assert_eq!(report.hard, CacheStats::default());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            entries: 0,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < f64::EPSILON);
    }
}
