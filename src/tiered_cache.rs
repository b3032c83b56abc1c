//! Tiered read-through cache
//!
//! Each [`CacheDomain`] is routed to one storage tier by its policy:
//! - Memory: per-domain LRU maps (fastest, lost on restart)
//! - Document store: persistent, one namespace per domain
//! - Flat store: persistent string store, also the fallback for document
//!   store domains when the document store cannot be opened
//!
//! The cache supports:
//! - Lazy expiry on read plus a periodic background sweep
//! - Persisted hit/miss/set/delete statistics
//! - Read-through queries with request coalescing per key
//!
//! Storage failures never reach callers. They are logged and the affected
//! operation degrades to a miss or a dropped write.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{
    fmt::Display,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::{
    CacheConfig, CacheDomain, CacheEntry, CacheStats, KeyParams, TierKind, build_key,
    clock::{Clock, SystemClock},
    single_flight::{Join, SingleFlight},
    stats::StatsRecorder,
    store::{DocumentStore, FlatStore},
    sweeper::{self, SweepReport, SweeperHandle},
    tier::{DocumentTier, FlatTier, MemoryTier, Tier},
};

/// Outcome of [`TieredCache::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    pub document_store: bool,
    pub flat_store: bool,
    /// Document store domains are being served from the flat store.
    pub document_fallback: bool,
}

/// Tiered cache handle. Clones share the same storage and counters.
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<TieredCacheInner>,
}

pub(crate) struct TieredCacheInner {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    memory: MemoryTier,
    document: DocumentTier,
    flat: Arc<FlatTier>,
    stats: StatsRecorder,
    flights: SingleFlight,
    document_fallback: AtomicBool,
}

impl TieredCache {
    /// Create a cache over the given stores using the system clock.
    ///
    /// Persistent tiers stay inert until [`TieredCache::init`] is called.
    pub fn new(
        config: CacheConfig,
        document_store: Arc<dyn DocumentStore>,
        flat_store: Arc<dyn FlatStore>,
    ) -> Self {
        Self::with_clock(config, document_store, flat_store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CacheConfig,
        document_store: Arc<dyn DocumentStore>,
        flat_store: Arc<dyn FlatStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let flat = Arc::new(FlatTier::new(flat_store));
        let stats = StatsRecorder::new(Arc::clone(&flat), config.stats_key.clone());
        Self {
            inner: Arc::new(TieredCacheInner {
                config,
                clock,
                memory: MemoryTier::new(),
                document: DocumentTier::new(document_store),
                flat,
                stats,
                flights: SingleFlight::default(),
                document_fallback: AtomicBool::new(false),
            }),
        }
    }

    /// Open the persistent stores and load persisted stats.
    ///
    /// A store that fails to open is logged and disabled for the lifetime
    /// of this cache.
    pub async fn init(&self) -> InitReport {
        let inner = &self.inner;
        let flat_store = inner.flat.open();
        inner.stats.load();

        let document_store = inner.document.open().await;
        let document_fallback =
            !document_store && inner.config.fallback_to_flat_store && flat_store;
        inner
            .document_fallback
            .store(document_fallback, Ordering::SeqCst);
        if document_fallback {
            warn!("Document store domains fall back to the flat store");
        }

        let report = InitReport {
            document_store,
            flat_store,
            document_fallback,
        };
        info!("Cache initialized: {:?}", report);
        report
    }

    /// Look up a live entry. Expired entries are misses but stay stored
    /// until the next sweep.
    pub async fn get<V: DeserializeOwned>(
        &self,
        domain: CacheDomain,
        identifier: impl Display,
        params: Option<&KeyParams>,
    ) -> Option<V> {
        let key = build_key(domain, identifier, params);
        self.inner.lookup(domain, &key).await
    }

    /// Store `value` under its key, replacing any previous entry.
    ///
    /// The entry lives for `ttl_override` if given, else the domain's TTL.
    /// Returns whether the value was stored; a value that cannot be
    /// serialized or a rejected storage write leaves the previous entry as
    /// it was.
    pub async fn set<V: Serialize>(
        &self,
        domain: CacheDomain,
        identifier: impl Display,
        value: &V,
        params: Option<&KeyParams>,
        ttl_override: Option<Duration>,
    ) -> bool {
        let key = build_key(domain, identifier, params);
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize value for key {}: {}", key, e);
                return false;
            }
        };
        self.inner.store(domain, key, value, ttl_override).await
    }

    pub async fn delete(
        &self,
        domain: CacheDomain,
        identifier: impl Display,
        params: Option<&KeyParams>,
    ) {
        let key = build_key(domain, identifier, params);
        debug!("Deleting cache entry {}", key);
        self.inner.tier(domain).delete(domain, &key).await;
        self.inner.stats.record_delete();
    }

    /// Read-through query.
    ///
    /// Returns the cached value if live. Otherwise runs `fetch` and caches
    /// a `Some` result before returning it. `None` results are returned
    /// without being cached, and fetch errors are returned unchanged.
    ///
    /// Concurrent misses on the same key share one fetch. If the sharing
    /// fetch fails, each waiting caller runs its own `fetch` instead.
    pub async fn cached_query<V, F, Fut, E>(
        &self,
        domain: CacheDomain,
        identifier: impl Display,
        params: Option<&KeyParams>,
        fetch: F,
    ) -> Result<Option<V>, E>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        let key = build_key(domain, identifier, params);
        if let Some(value) = self.inner.lookup(domain, &key).await {
            return Ok(Some(value));
        }

        if !self.inner.config.single_flight {
            let fetched = fetch().await?;
            if let Some(value) = &fetched {
                self.inner.store_serializable(domain, &key, value).await;
            }
            return Ok(fetched);
        }

        let guard = loop {
            match self.inner.flights.join(&key) {
                Join::Leader(guard) => break guard,
                Join::Follower(follower) => {
                    debug!("Waiting for in-flight fetch for key: {}", key);
                    match follower.wait().await {
                        Some(None) => return Ok(None),
                        Some(Some(shared)) => match serde_json::from_value(shared) {
                            Ok(value) => return Ok(Some(value)),
                            Err(e) => {
                                warn!(
                                    "Shared fetch result for key {} has another shape: {}",
                                    key, e
                                );
                            }
                        },
                        None => debug!("In-flight fetch for key {} failed, retrying", key),
                    }
                }
            }
        };

        // A previous leader may have stored the value between our miss and
        // taking the lead. Dropping the guard sends followers back to the tier.
        if let Some(value) = self.inner.read_live(domain, &key).await {
            return Ok(Some(value));
        }

        // Errors and cancellation drop the guard, releasing followers.
        let fetched = fetch().await?;
        match &fetched {
            Some(value) => {
                if let Some(json) = self.inner.store_serializable(domain, &key, value).await {
                    guard.complete(Some(json));
                }
            }
            None => {
                debug!("Fetch for key {} returned no data, not caching", key);
                guard.complete(None);
            }
        }
        Ok(fetched)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    /// Remove every entry of every domain from every tier. Stats are kept.
    pub async fn clear(&self) {
        for domain in CacheDomain::ALL {
            self.inner.clear_domain(domain).await;
        }
        info!("Cache cleared");
    }

    /// Remove every entry of one domain.
    pub async fn clear_domain(&self, domain: CacheDomain) {
        self.inner.clear_domain(domain).await;
        debug!("Cleared cache domain {}", domain);
    }

    /// Number of stored entries (live or expired) in the domain's tier.
    pub async fn tier_len(&self, domain: CacheDomain) -> usize {
        self.inner.tier(domain).len(domain).await
    }

    /// The tier currently serving `domain`.
    pub fn tier_of(&self, domain: CacheDomain) -> TierKind {
        self.inner.tier(domain).kind()
    }

    /// Delete expired entries from every tier now.
    pub async fn sweep_expired(&self) -> SweepReport {
        self.inner.sweep_expired().await
    }

    /// Start the periodic expiry sweep at the configured interval. The
    /// sweep stops when the handle is dropped or every cache clone is gone.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        sweeper::spawn(Arc::downgrade(&self.inner), self.inner.config.sweep_interval)
    }
}

impl TieredCacheInner {
    fn tier(&self, domain: CacheDomain) -> &dyn Tier {
        match domain.policy().tier {
            TierKind::Memory => &self.memory,
            TierKind::DocumentStore if self.document_fallback.load(Ordering::SeqCst) => {
                &*self.flat
            }
            TierKind::DocumentStore => &self.document,
            TierKind::FlatStore => &*self.flat,
        }
    }

    /// Live value for `key`, without touching the stats.
    async fn read_live<V: DeserializeOwned>(&self, domain: CacheDomain, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entry = self
            .tier(domain)
            .get(domain, key)
            .await
            .filter(|entry| !entry.is_expired(now))?;

        match serde_json::from_value(entry.into_value()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Cached value for key {} has another shape: {}", key, e);
                None
            }
        }
    }

    async fn lookup<V: DeserializeOwned>(&self, domain: CacheDomain, key: &str) -> Option<V> {
        let value = self.read_live(domain, key).await;
        if value.is_some() {
            debug!("Cache hit for key: {}", key);
            self.stats.record_hit();
        } else {
            debug!("Cache miss for key: {}", key);
            self.stats.record_miss();
        }
        value
    }

    async fn store(
        &self,
        domain: CacheDomain,
        key: String,
        value: Value,
        ttl_override: Option<Duration>,
    ) -> bool {
        let ttl = ttl_override.unwrap_or(domain.policy().ttl);
        let entry = CacheEntry::new(key, value, self.clock.now(), ttl);
        let stored = self.tier(domain).set(domain, entry).await;
        if stored {
            self.stats.record_set();
        }
        stored
    }

    /// Serialize and store a fetched value. Returns its JSON form unless
    /// serialization failed; a dropped storage write still returns it.
    async fn store_serializable<V: Serialize>(
        &self,
        domain: CacheDomain,
        key: &str,
        value: &V,
    ) -> Option<Value> {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize fetched value for key {}: {}", key, e);
                return None;
            }
        };
        self.store(domain, key.to_owned(), json.clone(), None).await;
        Some(json)
    }

    async fn clear_domain(&self, domain: CacheDomain) {
        self.memory.clear(domain).await;
        self.document.clear(domain).await;
        self.flat.clear(domain).await;
    }

    pub(crate) async fn sweep_expired(&self) -> SweepReport {
        let tiers: [&dyn Tier; 3] = [&self.memory, &self.document, &*self.flat];
        sweeper::sweep(&tiers, self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        store::{FileFlatStore, FsDocumentStore},
    };
    use serde::Deserialize;
    use serde_json::json;
    use std::{
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tempfile::TempDir;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Publication {
        title: String,
    }

    #[derive(Debug, PartialEq)]
    struct FetchError(&'static str);

    fn alice() -> User {
        User {
            name: "Alice".to_owned(),
        }
    }

    fn build(dir: &Path, clock: Arc<ManualClock>) -> TieredCache {
        TieredCache::with_clock(
            CacheConfig::default(),
            Arc::new(FsDocumentStore::new(dir.join("documents"))),
            Arc::new(FileFlatStore::new(dir.join("flat.json"))),
            clock,
        )
    }

    async fn setup() -> (TempDir, Arc<ManualClock>, TieredCache) {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let cache = build(dir.path(), Arc::clone(&clock));
        let report = cache.init().await;
        assert!(report.document_store && report.flat_store);
        (dir, clock, cache)
    }

    #[tokio::test]
    async fn test_set_get_then_expire() {
        let (_dir, clock, cache) = setup().await;

        assert!(cache.set(CacheDomain::Users, "u1", &alice(), None, None).await);
        assert_eq!(cache.get::<User>(CacheDomain::Users, "u1", None).await, Some(alice()));
        assert_eq!(cache.stats().hits, 1);

        clock.advance(Duration::from_millis(601_000));
        assert_eq!(cache.get::<User>(CacheDomain::Users, "u1", None).await, None);
        assert_eq!(cache.stats().misses, 1);
        // Expired entries are left for the sweep.
        assert_eq!(cache.tier_len(CacheDomain::Users).await, 1);
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let (_dir, clock, cache) = setup().await;
        let ttl = Duration::from_secs(30);

        cache.set(CacheDomain::Alerts, "a1", &1, None, Some(ttl)).await;
        clock.advance(ttl - Duration::from_millis(1));
        assert_eq!(cache.get::<i32>(CacheDomain::Alerts, "a1", None).await, Some(1));
        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get::<i32>(CacheDomain::Alerts, "a1", None).await, None);
    }

    #[tokio::test]
    async fn test_replacement_resets_ttl() {
        let (_dir, clock, cache) = setup().await;

        cache.set(CacheDomain::Messages, "m1", &"first", None, None).await;
        clock.advance(Duration::from_secs(50));
        cache.set(CacheDomain::Messages, "m1", &"second", None, None).await;
        clock.advance(Duration::from_secs(50));

        assert_eq!(
            cache.get::<String>(CacheDomain::Messages, "m1", None).await.as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_set_twice_keeps_one_entry() {
        let (_dir, _clock, cache) = setup().await;

        for domain in [CacheDomain::Users, CacheDomain::Reports, CacheDomain::Locations] {
            cache.set(domain, "x", &alice(), None, None).await;
            cache.set(domain, "x", &alice(), None, None).await;
            assert_eq!(cache.get::<User>(domain, "x", None).await, Some(alice()));
            assert_eq!(cache.tier_len(domain).await, 1, "{domain}");
        }
    }

    #[tokio::test]
    async fn test_params_discriminate_entries() {
        let (_dir, _clock, cache) = setup().await;
        let page1: KeyParams = [("page".to_owned(), json!(1))].into();
        let page2: KeyParams = [("page".to_owned(), json!(2))].into();

        cache.set(CacheDomain::Publications, "feed", &vec![1, 2], Some(&page1), None).await;
        cache.set(CacheDomain::Publications, "feed", &vec![3, 4], Some(&page2), None).await;

        assert_eq!(
            cache.get::<Vec<i32>>(CacheDomain::Publications, "feed", Some(&page1)).await,
            Some(vec![1, 2])
        );
        assert_eq!(cache.get::<Vec<i32>>(CacheDomain::Publications, "feed", None).await, None);
    }

    #[tokio::test]
    async fn test_long_filter_params_are_cached() {
        let (_dir, _clock, cache) = setup().await;
        let calls = AtomicUsize::new(0);
        let filter: KeyParams = [(
            "filter".to_owned(),
            json!({
                "from": "2024-01-01T00:00:00Z",
                "to": "2024-12-31T23:59:59Z",
                "groupBy": "week",
                "community": "riverside-neighbourhood-association",
            }),
        )]
        .into();

        for _ in 0..2 {
            let result = cache
                .cached_query(CacheDomain::Analytics, "dashboard", Some(&filter), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, FetchError>(Some(42))
                })
                .await;
            assert_eq!(result, Ok(Some(42)));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.tier_len(CacheDomain::Analytics).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sets_leave_a_readable_entry() {
        let (_dir, _clock, cache) = setup().await;
        let long = "x".repeat(5000);
        let short = "x".repeat(10);

        for _ in 0..50 {
            let writers: Vec<_> = (0..8)
                .map(|i| {
                    let cache = cache.clone();
                    let value = if i % 2 == 0 { long.clone() } else { short.clone() };
                    tokio::spawn(async move {
                        cache.set(CacheDomain::Reports, "r1", &value, None, None).await
                    })
                })
                .collect();
            for writer in writers {
                assert!(writer.await.unwrap());
            }

            let value = cache.get::<String>(CacheDomain::Reports, "r1", None).await;
            assert!(value == Some(long.clone()) || value == Some(short.clone()));
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, _clock, cache) = setup().await;

        cache.set(CacheDomain::Reports, "r1", &json!({"rows": 1}), None, None).await;
        cache.delete(CacheDomain::Reports, "r1", None).await;
        cache.delete(CacheDomain::Reports, "r1", None).await;

        assert_eq!(cache.get::<Value>(CacheDomain::Reports, "r1", None).await, None);
        assert_eq!(cache.stats().deletes, 2);
    }

    #[tokio::test]
    async fn test_unserializable_value_keeps_previous_entry() {
        let (_dir, _clock, cache) = setup().await;
        let bad: std::collections::HashMap<(i32, i32), i32> = [((1, 2), 3)].into();

        cache.set(CacheDomain::Locations, "fr", &"Paris", None, None).await;
        assert!(!cache.set(CacheDomain::Locations, "fr", &bad, None, None).await);

        assert_eq!(
            cache.get::<String>(CacheDomain::Locations, "fr", None).await.as_deref(),
            Some("Paris")
        );
        assert_eq!(cache.stats().sets, 1);
    }

    #[tokio::test]
    async fn test_cached_query_fetches_once() {
        let (_dir, _clock, cache) = setup().await;
        let calls = AtomicUsize::new(0);
        let title = Publication {
            title: "X".to_owned(),
        };

        for _ in 0..3 {
            let result = cache
                .cached_query(CacheDomain::Publications, "p42", None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, FetchError>(Some(title.clone()))
                })
                .await;
            assert_eq!(result, Ok(Some(title.clone())));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_cached_query_does_not_cache_none() {
        let (_dir, _clock, cache) = setup().await;
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache
                .cached_query(CacheDomain::Events, "e1", None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<Option<Value>, FetchError>(None)
                })
                .await;
            assert_eq!(result, Ok(None));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().sets, 0);
    }

    #[tokio::test]
    async fn test_cached_query_propagates_fetch_error() {
        let (_dir, _clock, cache) = setup().await;

        let result = cache
            .cached_query(CacheDomain::Users, "u9", None, || async {
                Err::<Option<User>, _>(FetchError("backend down"))
            })
            .await;

        assert_eq!(result, Err(FetchError("backend down")));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.sets), (0, 0));
        assert_eq!(cache.inner.flights.len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_one_fetch() {
        let (_dir, _clock, cache) = setup().await;
        let calls = AtomicUsize::new(0);

        let queries = (0..5).map(|_| {
            cache.cached_query(CacheDomain::Users, "u1", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, FetchError>(Some(alice()))
            })
        });
        let results = futures::future::join_all(queries).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.into_iter().all(|r| r == Ok(Some(alice()))));
    }

    #[tokio::test]
    async fn test_failed_leader_lets_follower_fetch() {
        let (_dir, _clock, cache) = setup().await;

        let leader = cache.cached_query(CacheDomain::Users, "u1", None, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<Option<User>, _>(FetchError("timeout"))
        });
        let follower = cache.cached_query(CacheDomain::Users, "u1", None, || async {
            Ok::<_, FetchError>(Some(alice()))
        });
        let (leader, follower) = tokio::join!(leader, follower);

        assert_eq!(leader, Err(FetchError("timeout")));
        assert_eq!(follower, Ok(Some(alice())));
        assert_eq!(cache.get::<User>(CacheDomain::Users, "u1", None).await, Some(alice()));
    }

    #[tokio::test]
    async fn test_persistent_tiers_survive_restart() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());

        let cache = build(dir.path(), Arc::clone(&clock));
        cache.init().await;
        cache.set(CacheDomain::Reports, "r1", &json!({"total": 9}), None, None).await;
        cache.set(CacheDomain::Locations, "se", &"Stockholm", None, None).await;
        cache.set(CacheDomain::Users, "u1", &alice(), None, None).await;
        drop(cache);

        let cache = build(dir.path(), clock);
        cache.init().await;
        assert_eq!(cache.stats().sets, 3);
        assert_eq!(
            cache.get::<Value>(CacheDomain::Reports, "r1", None).await,
            Some(json!({"total": 9}))
        );
        assert_eq!(
            cache.get::<String>(CacheDomain::Locations, "se", None).await.as_deref(),
            Some("Stockholm")
        );
        assert_eq!(cache.get::<User>(CacheDomain::Users, "u1", None).await, None);
    }

    #[tokio::test]
    async fn test_document_domains_fall_back_to_flat_store() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("documents"), b"not a directory").unwrap();

        let cache = build(dir.path(), Arc::new(ManualClock::default()));
        let report = cache.init().await;
        assert_eq!(
            report,
            InitReport {
                document_store: false,
                flat_store: true,
                document_fallback: true,
            }
        );
        assert_eq!(cache.tier_of(CacheDomain::Analytics), TierKind::FlatStore);

        assert!(cache.set(CacheDomain::Analytics, "week", &42, None, None).await);
        assert_eq!(cache.get::<i32>(CacheDomain::Analytics, "week", None).await, Some(42));
    }

    #[tokio::test]
    async fn test_unavailable_stores_degrade_to_misses() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("documents"), b"x").unwrap();
        std::fs::write(dir.path().join("flat.json"), b"corrupt").unwrap();

        let cache = build(dir.path(), Arc::new(ManualClock::default()));
        let report = cache.init().await;
        assert!(!report.document_store && !report.flat_store && !report.document_fallback);

        assert!(!cache.set(CacheDomain::Reports, "r1", &1, None, None).await);
        assert_eq!(cache.get::<i32>(CacheDomain::Reports, "r1", None).await, None);
        // The memory tier is unaffected.
        assert!(cache.set(CacheDomain::Users, "u1", &alice(), None, None).await);
        assert_eq!(cache.get::<User>(CacheDomain::Users, "u1", None).await, Some(alice()));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_entries() {
        let (_dir, clock, cache) = setup().await;

        cache.set(CacheDomain::Messages, "old", &1, None, None).await;
        cache.set(CacheDomain::Reports, "old", &1, None, Some(Duration::from_secs(30))).await;
        cache.set(CacheDomain::Notifications, "old", &1, None, None).await;
        clock.advance(Duration::from_secs(61));
        cache.set(CacheDomain::Messages, "new", &2, None, None).await;
        cache.set(CacheDomain::Reports, "new", &2, None, None).await;

        let report = cache.sweep_expired().await;
        assert_eq!(report.removed, 3);
        assert_eq!(cache.tier_len(CacheDomain::Messages).await, 1);
        assert_eq!(cache.tier_len(CacheDomain::Reports).await, 1);
        assert_eq!(cache.tier_len(CacheDomain::Notifications).await, 0);
    }

    #[tokio::test]
    async fn test_clear_empties_every_tier_and_keeps_stats() {
        let (_dir, _clock, cache) = setup().await;

        cache.set(CacheDomain::Users, "u1", &alice(), None, None).await;
        cache.set(CacheDomain::Reports, "r1", &1, None, None).await;
        cache.set(CacheDomain::Locations, "fr", &"Paris", None, None).await;

        cache.clear_domain(CacheDomain::Users).await;
        assert_eq!(cache.tier_len(CacheDomain::Users).await, 0);
        assert_eq!(cache.tier_len(CacheDomain::Reports).await, 1);

        cache.clear().await;
        for domain in CacheDomain::ALL {
            assert_eq!(cache.tier_len(domain).await, 0, "{domain}");
        }
        assert_eq!(cache.stats().sets, 3);

        cache.reset_stats();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
