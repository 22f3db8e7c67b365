//! Call-site memoizer backed by moka

use std::any::{Any, TypeId};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use moka::sync::Cache as MokaCache;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use super::config::MemoizerConfig;
use crate::domain::memo::{CacheName, InFlightPolicy, MemoStats, StatsRecorder};

/// Identifies one table: a cache name used with one key type and one value type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableId {
    name: CacheName,
    key_type: TypeId,
    value_type: TypeId,
}

impl TableId {
    fn of<K: 'static, V: 'static>(name: &CacheName) -> Self {
        Self {
            name: name.clone(),
            key_type: TypeId::of::<K>(),
            value_type: TypeId::of::<V>(),
        }
    }
}

/// Holds at most one value; empty until a computation for its key succeeds
type Slot<V> = Arc<OnceCell<V>>;

/// Per-call-site store. Keys compare by full equality.
struct SiteTable<K, V> {
    slots: MokaCache<K, Slot<V>>,
}

impl<K, V> SiteTable<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn new() -> Self {
        // No capacity: entries live as long as the memoizer
        Self {
            slots: MokaCache::builder().build(),
        }
    }

    fn slot(&self, key: K) -> Slot<V> {
        self.slots.get_with(key, || Arc::new(OnceCell::new()))
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.slots.get(key).and_then(|slot| slot.get().cloned())
    }
}

/// A single-flight slot in use by one caller.
///
/// On drop, a slot that is still empty and used by nobody else is removed
/// from its table, so failed and cancelled computations leave no entry.
struct PendingSlot<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    table: Arc<SiteTable<K, V>>,
    key: K,
    slot: Slot<V>,
}

impl<K, V> Drop for PendingSlot<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.slot.initialized() {
            return;
        }

        let Some(current) = self.table.slots.get(&self.key) else {
            return;
        };

        // Held by the table, this guard and `current` only
        if Arc::ptr_eq(&current, &self.slot) && Arc::strong_count(&current) == 3 {
            self.table.slots.invalidate(&self.key);
        }
    }
}

type ErasedTable = Arc<dyn Any + Send + Sync>;

/// Caches computation results per (cache name, discriminator key).
///
/// A `None` key opts out: the computation runs every time and nothing is
/// stored. A failed computation is never stored, so the next call with the
/// same key tries again. Stored values are never replaced or evicted.
///
/// Under [`InFlightPolicy::Duplicate`] concurrent misses on one key all run
/// their computation; the first result stored is kept and each caller gets
/// its own result. [`InFlightPolicy::SingleFlight`] lets concurrent async
/// callers share a single execution instead.
pub struct Memoizer {
    tables: MokaCache<TableId, ErasedTable>,
    stats: StatsRecorder,
    config: MemoizerConfig,
}

impl std::fmt::Debug for Memoizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoizer")
            .field("policy", &self.config.in_flight)
            .field("sites", &self.tables.entry_count())
            .finish()
    }
}

impl Default for Memoizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Memoizer {
    /// Creates a memoizer with the default configuration
    pub fn new() -> Self {
        Self::with_config(MemoizerConfig::default())
    }

    pub fn with_config(config: MemoizerConfig) -> Self {
        Self {
            tables: MokaCache::builder().build(),
            stats: StatsRecorder::default(),
            config,
        }
    }

    pub fn policy(&self) -> InFlightPolicy {
        self.config.in_flight
    }

    /// Returns the cached value for `key`, computing and storing it on a miss
    pub fn memoize<K, V, F>(&self, name: &CacheName, key: Option<K>, compute: F) -> V
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> V,
    {
        let Some(key) = self.require_key(name, key) else {
            return compute();
        };

        if let Some(value) = self.hit::<K, V>(name, &key) {
            return value;
        }

        self.record_miss(name);
        let value = compute();
        self.store(name, key, value.clone());
        value
    }

    /// Stores an already computed `value` unless one is cached for `key`
    pub fn memoize_value<K, V>(&self, name: &CacheName, key: Option<K>, value: V) -> V
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.memoize(name, key, move || value)
    }

    /// Async variant of [`memoize`](Self::memoize)
    pub async fn memoize_async<K, V, F, Fut>(
        &self,
        name: &CacheName,
        key: Option<K>,
        compute: F,
    ) -> V
    where
        K: Clone + Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let Some(key) = self.require_key(name, key) else {
            return compute().await;
        };

        if let Some(value) = self.hit::<K, V>(name, &key) {
            return value;
        }

        match self.config.in_flight {
            InFlightPolicy::Duplicate => {
                self.record_miss(name);
                let value = compute().await;
                self.store(name, key, value.clone());
                value
            }
            InFlightPolicy::SingleFlight => {
                let Some(pending) = self.pending_slot::<K, V>(name, key) else {
                    return compute().await;
                };

                let mut ran = false;
                let value = pending
                    .slot
                    .get_or_init(|| {
                        ran = true;
                        compute()
                    })
                    .await
                    .clone();

                self.settle_shared(name, ran);
                value
            }
        }
    }

    /// Failable async variant. An error is returned to the caller untouched
    /// and leaves no entry behind.
    pub async fn try_memoize_async<K, V, E, F, Fut>(
        &self,
        name: &CacheName,
        key: Option<K>,
        compute: F,
    ) -> Result<V, E>
    where
        K: Clone + Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let Some(key) = self.require_key(name, key) else {
            return compute().await;
        };

        if let Some(value) = self.hit::<K, V>(name, &key) {
            return Ok(value);
        }

        match self.config.in_flight {
            InFlightPolicy::Duplicate => {
                self.record_miss(name);
                let value = compute().await?;
                self.store(name, key, value.clone());
                Ok(value)
            }
            InFlightPolicy::SingleFlight => {
                let Some(pending) = self.pending_slot::<K, V>(name, key) else {
                    return compute().await;
                };

                let mut ran = false;
                let result = pending
                    .slot
                    .get_or_try_init(|| {
                        ran = true;
                        compute()
                    })
                    .await
                    .cloned();

                match result {
                    Ok(value) => {
                        self.settle_shared(name, ran);
                        Ok(value)
                    }
                    Err(e) => {
                        self.record_miss(name);
                        debug!(cache = %name, "Memoized computation failed, nothing stored");
                        Err(e)
                    }
                }
            }
        }
    }

    /// Returns the stored value for `key` without computing anything
    pub fn cached<K, V>(&self, name: &CacheName, key: &K) -> Option<V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.table::<K, V>(name)?.peek(key)
    }

    pub fn contains<K, V>(&self, name: &CacheName, key: &K) -> bool
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.cached::<K, V>(name, key).is_some()
    }

    pub fn stats(&self) -> MemoStats {
        self.tables.run_pending_tasks();
        self.stats.snapshot(self.tables.entry_count())
    }

    /// Passes `key` through, counting a bypass when it is absent
    fn require_key<K>(&self, name: &CacheName, key: Option<K>) -> Option<K> {
        if key.is_none() {
            self.stats.record_bypass();
            debug!(cache = %name, "No cache key, computing without memoization");
        }

        key
    }

    /// Existing table for `name`, if any
    fn table<K, V>(&self, name: &CacheName) -> Option<Arc<SiteTable<K, V>>>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let erased = self.tables.get(&TableId::of::<K, V>(name))?;
        Self::downcast::<K, V>(name, erased)
    }

    fn table_or_create<K, V>(&self, name: &CacheName) -> Option<Arc<SiteTable<K, V>>>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let erased = self.tables.get_with(TableId::of::<K, V>(name), || {
            debug!(cache = %name, "Creating memo table");
            Arc::new(SiteTable::<K, V>::new()) as ErasedTable
        });

        Self::downcast::<K, V>(name, erased)
    }

    fn pending_slot<K, V>(&self, name: &CacheName, key: K) -> Option<PendingSlot<K, V>>
    where
        K: Clone + Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let table = self.table_or_create::<K, V>(name)?;
        let slot = table.slot(key.clone());

        Some(PendingSlot { table, key, slot })
    }

    fn downcast<K, V>(name: &CacheName, erased: ErasedTable) -> Option<Arc<SiteTable<K, V>>>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match erased.downcast::<SiteTable<K, V>>() {
            Ok(table) => Some(table),
            Err(_) => {
                error!(cache = %name, "Memo table type mismatch, bypassing cache");
                None
            }
        }
    }

    fn hit<K, V>(&self, name: &CacheName, key: &K) -> Option<V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let value = self.cached::<K, V>(name, key)?;
        self.stats.record_hit();
        debug!(cache = %name, "Memo cache hit");
        Some(value)
    }

    fn record_miss(&self, name: &CacheName) {
        self.stats.record_miss();
        debug!(cache = %name, "Memo cache miss, computing");
    }

    /// Stores a computed value. Tables and slots are only created here, so a
    /// key whose computation never succeeds leaves nothing behind.
    fn store<K, V>(&self, name: &CacheName, key: K, value: V)
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let Some(table) = self.table_or_create::<K, V>(name) else {
            return;
        };

        match table.slot(key).set(value) {
            Ok(()) => self.stats.record_entry(),
            Err(_) => {
                debug!(cache = %name, "Concurrent computation stored first, keeping its value")
            }
        }
    }

    /// Accounts for a single-flight call that either ran the computation or
    /// waited on another caller's run.
    fn settle_shared(&self, name: &CacheName, ran: bool) {
        if ran {
            self.record_miss(name);
            self.stats.record_entry();
        } else {
            self.stats.record_hit();
            debug!(cache = %name, "Joined in-flight computation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::anyhow;
    use futures::future::join_all;
    use tokio_test::{assert_err, assert_ok};

    static SITE_A: CacheName = CacheName::from_static("siteA");
    static SITE_B: CacheName = CacheName::from_static("siteB");

    #[test]
    fn test_scenario_a_sync_value_computed_once() {
        let memoizer = Memoizer::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = memoizer.memoize(&SITE_A, Some(42), || {
                calls.fetch_add(1, Ordering::SeqCst);
                7
            });
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_hits_never_recompute() {
        let memoizer = Memoizer::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..50 {
            memoizer.memoize(&SITE_A, Some("key"), || calls.fetch_add(1, Ordering::SeqCst));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = memoizer.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 49);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_scenario_b_missing_key_always_computes() {
        let memoizer = Memoizer::new();
        let calls = AtomicUsize::new(0);

        let values: Vec<u64> = (0..3)
            .map(|_| {
                memoizer.memoize(&SITE_A, None::<i32>, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    rand::random::<u64>()
                })
            })
            .collect();

        assert_eq!(values.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let stats = memoizer.stats();
        assert_eq!(stats.bypasses, 3);
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.sites, 0);
    }

    #[test]
    fn test_keys_are_isolated() {
        let memoizer = Memoizer::new();

        let first = memoizer.memoize(&SITE_A, Some(1), || "one".to_string());
        let second = memoizer.memoize(&SITE_A, Some(2), || "two".to_string());

        assert_eq!(first, "one");
        assert_eq!(second, "two");
        assert_eq!(
            memoizer.cached::<i32, String>(&SITE_A, &1),
            Some("one".to_string())
        );
        assert_eq!(
            memoizer.cached::<i32, String>(&SITE_A, &2),
            Some("two".to_string())
        );
    }

    #[test]
    fn test_call_sites_are_isolated() {
        let memoizer = Memoizer::new();

        let a = memoizer.memoize(&SITE_A, Some("shared"), || 1);
        let b = memoizer.memoize(&SITE_B, Some("shared"), || 2);

        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(memoizer.stats().sites, 2);
    }

    #[test]
    fn test_value_types_get_separate_tables() {
        let memoizer = Memoizer::new();

        let text = memoizer.memoize(&SITE_A, Some(5u32), || "five".to_string());
        let number = memoizer.memoize(&SITE_A, Some(5u32), || 5u64);

        assert_eq!(text, "five");
        assert_eq!(number, 5);
        assert_eq!(memoizer.stats().sites, 2);
    }

    #[test]
    fn test_keys_compare_by_equality_not_hash() {
        #[derive(Debug, PartialEq, Eq)]
        struct Colliding(u8);

        impl Hash for Colliding {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                0u8.hash(state);
            }
        }

        let memoizer = Memoizer::new();

        let first = memoizer.memoize(&SITE_A, Some(Colliding(1)), || "first");
        let second = memoizer.memoize(&SITE_A, Some(Colliding(2)), || "second");

        assert_eq!(first, "first");
        assert_eq!(second, "second");
    }

    #[test]
    fn test_memoize_value_keeps_first_value() {
        let memoizer = Memoizer::new();

        assert_eq!(memoizer.memoize_value(&SITE_A, Some('k'), 10), 10);
        assert_eq!(memoizer.memoize_value(&SITE_A, Some('k'), 20), 10);
        assert_eq!(memoizer.memoize_value(&SITE_A, None::<char>, 30), 30);
    }

    #[test]
    fn test_cached_does_not_create_tables() {
        let memoizer = Memoizer::new();

        assert!(!memoizer.contains::<i32, i32>(&SITE_A, &1));
        assert_eq!(memoizer.stats().sites, 0);
    }

    #[test]
    fn test_parallel_threads_share_the_store() {
        let memoizer = Arc::new(Memoizer::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let memoizer = Arc::clone(&memoizer);
                let calls = Arc::clone(&calls);

                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let value = memoizer.memoize(&SITE_A, Some(thread), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread * 10
                        });
                        assert_eq!(value, thread * 10);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(memoizer.stats().entries, 8);
    }

    #[tokio::test]
    async fn test_async_value_computed_once() {
        let memoizer = Memoizer::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..3 {
            let value = memoizer
                .memoize_async(&SITE_A, Some("interval"), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    vec![1, 2, 3]
                })
                .await;
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_missing_key_always_computes() {
        let memoizer = Memoizer::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..4 {
            memoizer
                .memoize_async(&SITE_A, None::<&str>, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst)
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    async fn run_scenario_c(memoizer: &Memoizer) {
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let attempt = move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                Err(anyhow!("transient"))
            } else {
                Ok("ok".to_string())
            }
        };

        let first = memoizer.try_memoize_async(&SITE_A, Some("x"), attempt).await;
        let error = assert_err!(first);
        assert_eq!(error.to_string(), "transient");
        assert!(!memoizer.contains::<&str, String>(&SITE_A, &"x"));

        let second = memoizer.try_memoize_async(&SITE_A, Some("x"), attempt).await;
        assert_eq!(assert_ok!(second), "ok");

        let third = memoizer.try_memoize_async(&SITE_A, Some("x"), attempt).await;
        assert_eq!(assert_ok!(third), "ok");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scenario_c_failures_are_not_cached() {
        run_scenario_c(&Memoizer::new()).await;
    }

    #[tokio::test]
    async fn test_scenario_c_single_flight() {
        run_scenario_c(&Memoizer::with_config(MemoizerConfig::single_flight())).await;
    }

    #[tokio::test]
    async fn test_failure_leaves_other_entries_intact() {
        let memoizer = Memoizer::new();

        let stored: Result<i32, anyhow::Error> = memoizer
            .try_memoize_async(&SITE_A, Some(1), || async { Ok(100) })
            .await;
        assert_eq!(stored.unwrap(), 100);

        let failed: Result<i32, anyhow::Error> = memoizer
            .try_memoize_async(&SITE_A, Some(2), || async { Err(anyhow!("boom")) })
            .await;
        assert!(failed.is_err());

        assert_eq!(memoizer.cached::<i32, i32>(&SITE_A, &1), Some(100));
        assert_eq!(memoizer.cached::<i32, i32>(&SITE_A, &2), None);
        assert_eq!(memoizer.stats().entries, 1);
    }

    #[tokio::test]
    async fn test_error_type_passes_through_unchanged() {
        #[derive(Debug, PartialEq)]
        struct QueryError(&'static str);

        let memoizer = Memoizer::new();
        let result: Result<u8, QueryError> = memoizer
            .try_memoize_async(&SITE_A, Some(1), || async { Err(QueryError("denied")) })
            .await;

        assert_eq!(result, Err(QueryError("denied")));
    }

    #[tokio::test]
    async fn test_duplicate_policy_runs_concurrent_misses() {
        let memoizer = Memoizer::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let results = join_all((0..3).map(|_| {
            memoizer.memoize_async(&SITE_A, Some("race"), move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                n
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(memoizer.stats().entries, 1);

        let kept = memoizer.cached::<&str, usize>(&SITE_A, &"race").unwrap();
        assert!(results.contains(&kept));
    }

    #[tokio::test]
    async fn test_single_flight_shares_one_execution() {
        let memoizer = Memoizer::with_config(MemoizerConfig::single_flight());
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let results = join_all((0..5).map(|_| {
            memoizer.memoize_async(&SITE_A, Some("race"), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                "shared".to_string()
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == "shared"));

        let stats = memoizer.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 4);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_single_flight_waiter_retries_after_leader_fails() {
        let memoizer = Memoizer::with_config(MemoizerConfig::single_flight());
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let attempt = move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if n == 0 {
                Err(anyhow!("leader failed"))
            } else {
                Ok(n)
            }
        };

        let results = join_all([
            memoizer.try_memoize_async(&SITE_A, Some(1), attempt),
            memoizer.try_memoize_async(&SITE_A, Some(1), attempt),
        ])
        .await;

        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap(), &1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memoizer.cached::<i32, usize>(&SITE_A, &1), Some(1));
    }

    #[tokio::test]
    async fn test_cancelled_computation_stores_nothing() {
        let memoizer = Memoizer::new();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            memoizer.memoize_async(&SITE_A, Some(9), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                1
            }),
        )
        .await;

        assert!(cancelled.is_err());
        assert!(!memoizer.contains::<i32, i32>(&SITE_A, &9));

        let value = memoizer.memoize_async(&SITE_A, Some(9), || async { 2 }).await;
        assert_eq!(value, 2);
    }

    #[test]
    fn test_policy_accessor() {
        assert_eq!(Memoizer::new().policy(), InFlightPolicy::Duplicate);
        assert_eq!(
            Memoizer::with_config(MemoizerConfig::single_flight()).policy(),
            InFlightPolicy::SingleFlight
        );
    }

    fn slot_count<K, V>(memoizer: &Memoizer, name: &CacheName) -> u64
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        memoizer.table::<K, V>(name).map_or(0, |table| {
            table.slots.run_pending_tasks();
            table.slots.entry_count()
        })
    }

    #[tokio::test]
    async fn test_single_flight_waiter_takes_over_from_cancelled_leader() {
        let memoizer = Arc::new(Memoizer::with_config(MemoizerConfig::single_flight()));
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = tokio::spawn({
            let memoizer = Arc::clone(&memoizer);
            let calls = Arc::clone(&calls);
            async move {
                memoizer
                    .memoize_async(&SITE_A, Some(1), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        1
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let waiter = tokio::spawn({
            let memoizer = Arc::clone(&memoizer);
            let calls = Arc::clone(&calls);
            async move {
                memoizer
                    .memoize_async(&SITE_A, Some(1), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        2
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        assert_eq!(waiter.await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memoizer.cached::<i32, i32>(&SITE_A, &1), Some(2));
    }

    async fn run_cancelled_failable(memoizer: &Memoizer) {
        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            memoizer.try_memoize_async(&SITE_A, Some(3), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, anyhow::Error>(1)
            }),
        )
        .await;

        assert!(cancelled.is_err());
        assert!(!memoizer.contains::<i32, i32>(&SITE_A, &3));
        assert_eq!(slot_count::<i32, i32>(memoizer, &SITE_A), 0);

        let retried = memoizer
            .try_memoize_async(&SITE_A, Some(3), || async { Ok::<_, anyhow::Error>(2) })
            .await;
        assert_eq!(assert_ok!(retried), 2);
        assert_eq!(memoizer.cached::<i32, i32>(&SITE_A, &3), Some(2));
    }

    #[tokio::test]
    async fn test_cancelled_failable_computation_stores_nothing() {
        run_cancelled_failable(&Memoizer::new()).await;
    }

    #[tokio::test]
    async fn test_cancelled_failable_computation_single_flight() {
        run_cancelled_failable(&Memoizer::with_config(MemoizerConfig::single_flight())).await;
    }

    #[tokio::test]
    async fn test_failed_keys_leave_no_tables() {
        let memoizer = Memoizer::new();

        for key in 0..100 {
            let result: Result<i32, anyhow::Error> = memoizer
                .try_memoize_async(&SITE_A, Some(key), || async { Err(anyhow!("unlisted")) })
                .await;
            assert!(result.is_err());
        }

        let stats = memoizer.stats();
        assert_eq!(stats.misses, 100);
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.sites, 0);
    }

    #[tokio::test]
    async fn test_single_flight_failures_leave_no_slots() {
        let memoizer = Memoizer::with_config(MemoizerConfig::single_flight());

        for key in 0..100 {
            let result: Result<i32, anyhow::Error> = memoizer
                .try_memoize_async(&SITE_A, Some(key), || async { Err(anyhow!("unlisted")) })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(slot_count::<i32, i32>(&memoizer, &SITE_A), 0);
        assert_eq!(memoizer.stats().entries, 0);

        let stored: Result<i32, anyhow::Error> = memoizer
            .try_memoize_async(&SITE_A, Some(7), || async { Ok(7) })
            .await;
        assert_eq!(assert_ok!(stored), 7);
        assert_eq!(slot_count::<i32, i32>(&memoizer, &SITE_A), 1);
    }
}
